//! Activity repository — the append-only ledger, keyed by transaction hash

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted activity ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityRecord {
    pub id: Option<i64>,
    pub transaction_hash: String,
    pub trader_address: String,
    pub market_id: Option<String>,
    pub activity_type: String,
    pub side: Option<String>,
    pub outcome: Option<String>,
    pub shares_amount: f64,
    pub cash_amount: f64,
    pub price: Option<f64>,
    pub fee_amount: f64,
    pub realized_pnl: Option<f64>,
    pub asset_id: Option<String>,
    pub timestamp: Option<i64>,
    pub metadata: Option<String>,
    pub created_at: Option<i64>,
}

pub struct ActivityRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ActivityRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert activities with deduplication (INSERT OR IGNORE by
    /// transaction_hash). Returns the number of newly inserted rows.
    pub async fn insert_ignore_all(&self, activities: &[ActivityRecord]) -> DbResult<usize> {
        let mut inserted = 0usize;
        for activity in activities {
            let result = sqlx::query(
                r#"INSERT OR IGNORE INTO activities
                    (transaction_hash, trader_address, market_id, activity_type, side,
                     outcome, shares_amount, cash_amount, price, fee_amount,
                     realized_pnl, asset_id, timestamp, metadata)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            )
            .bind(&activity.transaction_hash)
            .bind(&activity.trader_address)
            .bind(&activity.market_id)
            .bind(&activity.activity_type)
            .bind(&activity.side)
            .bind(&activity.outcome)
            .bind(activity.shares_amount)
            .bind(activity.cash_amount)
            .bind(activity.price)
            .bind(activity.fee_amount)
            .bind(activity.realized_pnl)
            .bind(&activity.asset_id)
            .bind(activity.timestamp)
            .bind(&activity.metadata)
            .execute(self.pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    pub async fn get_for_trader(&self, address: &str) -> DbResult<Vec<ActivityRecord>> {
        let records = sqlx::query_as::<_, ActivityRecord>(
            "SELECT * FROM activities WHERE trader_address = ?1 ORDER BY timestamp",
        )
        .bind(address)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count_for_trader(&self, address: &str) -> DbResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM activities WHERE trader_address = ?1")
                .bind(address)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0)
    }

    /// Activity counts grouped by kind, for the diagnostics surface
    pub async fn count_by_kind(&self, address: &str) -> DbResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT activity_type, COUNT(*) FROM activities
               WHERE trader_address = ?1
               GROUP BY activity_type
               ORDER BY activity_type"#,
        )
        .bind(address)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn record(tx: &str, kind: &str) -> ActivityRecord {
        ActivityRecord {
            id: None,
            transaction_hash: tx.into(),
            trader_address: "0xabc".into(),
            market_id: Some("0xm".into()),
            activity_type: kind.into(),
            side: Some("BUY".into()),
            outcome: Some("Yes".into()),
            shares_amount: 100.0,
            cash_amount: 50.0,
            price: Some(0.5),
            fee_amount: 0.0,
            realized_pnl: None,
            asset_id: Some("0xtok".into()),
            timestamp: Some(1_700_000_000),
            metadata: Some("{}".into()),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_ignore_dedups_by_hash() {
        let db = Database::in_memory().await.unwrap();
        let repo = ActivityRepository::new(db.pool());

        let first = repo
            .insert_ignore_all(&[record("0x1", "TRADE"), record("0x2", "REDEEM")])
            .await
            .unwrap();
        assert_eq!(first, 2);

        // Re-running the same pull inserts nothing new
        let second = repo
            .insert_ignore_all(&[record("0x1", "TRADE"), record("0x2", "REDEEM")])
            .await
            .unwrap();
        assert_eq!(second, 0);
        assert_eq!(repo.count_for_trader("0xabc").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_count_by_kind() {
        let db = Database::in_memory().await.unwrap();
        let repo = ActivityRepository::new(db.pool());

        repo.insert_ignore_all(&[
            record("0x1", "TRADE"),
            record("0x2", "TRADE"),
            record("0x3", "REDEEM"),
        ])
        .await
        .unwrap();

        let counts = repo.count_by_kind("0xabc").await.unwrap();
        assert_eq!(counts, vec![("REDEEM".to_string(), 1), ("TRADE".to_string(), 2)]);
    }
}
