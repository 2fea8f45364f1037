//! Position repository — reconciled positions, upserted by trader + market + outcome

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted position row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionRecord {
    pub id: Option<i64>,
    pub trader_address: String,
    pub market_id: String,
    pub outcome: String,
    pub shares: f64,
    pub invested_amount: f64,
    pub avg_entry_price: Option<f64>,
    pub current_value: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub reconstructed: i64,
    pub entered_at: Option<i64>,
    pub exited_at: Option<i64>,
    pub last_updated: Option<String>,
}

pub struct PositionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PositionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert positions by (trader_address, market_id, outcome)
    pub async fn upsert_all(&self, positions: &[PositionRecord]) -> DbResult<()> {
        for position in positions {
            sqlx::query(
                r#"INSERT INTO positions
                    (trader_address, market_id, outcome, shares, invested_amount,
                     avg_entry_price, current_value, realized_pnl, reconstructed,
                     entered_at, exited_at, last_updated)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                   ON CONFLICT(trader_address, market_id, outcome) DO UPDATE SET
                     shares = excluded.shares,
                     invested_amount = excluded.invested_amount,
                     avg_entry_price = excluded.avg_entry_price,
                     current_value = excluded.current_value,
                     realized_pnl = excluded.realized_pnl,
                     reconstructed = excluded.reconstructed,
                     entered_at = COALESCE(positions.entered_at, excluded.entered_at),
                     exited_at = excluded.exited_at,
                     last_updated = excluded.last_updated
                "#,
            )
            .bind(&position.trader_address)
            .bind(&position.market_id)
            .bind(&position.outcome)
            .bind(position.shares)
            .bind(position.invested_amount)
            .bind(position.avg_entry_price)
            .bind(position.current_value)
            .bind(position.realized_pnl)
            .bind(position.reconstructed)
            .bind(position.entered_at)
            .bind(position.exited_at)
            .bind(&position.last_updated)
            .execute(self.pool)
            .await?;
        }

        Ok(())
    }

    pub async fn get_for_trader(&self, address: &str) -> DbResult<Vec<PositionRecord>> {
        let records = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE trader_address = ?1 ORDER BY market_id",
        )
        .bind(address)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count_for_trader(&self, address: &str) -> DbResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM positions WHERE trader_address = ?1")
                .bind(address)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0)
    }

    /// Positions whose market reference is a repair-pass placeholder
    pub async fn count_missing_market(&self, address: &str) -> DbResult<i64> {
        let pattern = format!("{}%", crate::PLACEHOLDER_MARKET_PREFIX);
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM positions WHERE trader_address = ?1 AND market_id LIKE ?2",
        )
        .bind(address)
        .bind(pattern)
        .fetch_one(self.pool)
        .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn record(market_id: &str, shares: f64) -> PositionRecord {
        PositionRecord {
            id: None,
            trader_address: "0xabc".into(),
            market_id: market_id.into(),
            outcome: "Yes".into(),
            shares,
            invested_amount: 28.0,
            avg_entry_price: Some(0.5),
            current_value: None,
            realized_pnl: None,
            reconstructed: 1,
            entered_at: Some(100),
            exited_at: None,
            last_updated: Some("2026-01-01T00:00:00Z".into()),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let repo = PositionRepository::new(db.pool());

        let positions = vec![record("0xm1", 60.0), record("0xm2", 10.0)];
        repo.upsert_all(&positions).await.unwrap();
        repo.upsert_all(&positions).await.unwrap();

        assert_eq!(repo.count_for_trader("0xabc").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let db = Database::in_memory().await.unwrap();
        let repo = PositionRepository::new(db.pool());

        repo.upsert_all(&[record("0xm1", 60.0)]).await.unwrap();
        repo.upsert_all(&[record("0xm1", 75.0)]).await.unwrap();

        let rows = repo.get_for_trader("0xabc").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].shares, 75.0);
    }

    #[tokio::test]
    async fn test_count_missing_market() {
        let db = Database::in_memory().await.unwrap();
        let repo = PositionRepository::new(db.pool());

        let placeholder = format!("{}0xtok", crate::PLACEHOLDER_MARKET_PREFIX);
        repo.upsert_all(&[record("0xm1", 1.0), record(&placeholder, 1.0)])
            .await
            .unwrap();

        assert_eq!(repo.count_missing_market("0xabc").await.unwrap(), 1);
    }
}
