//! Market repository — markets discovered from positions and activities

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted market row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketRecord {
    pub id: Option<i64>,
    pub market_id: String,
    pub condition_id: Option<String>,
    pub question: String,
    pub category: Option<String>,
    pub active: i64,
    pub closed: i64,
    pub resolved: i64,
    pub volume: f64,
    pub liquidity: f64,
    pub end_date: Option<String>,
    pub placeholder: i64,
    pub last_synced_at: Option<String>,
}

pub struct MarketRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MarketRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a resolved market by market_id. Clears any placeholder flag a
    /// previous repair pass left behind.
    pub async fn upsert(&self, record: &MarketRecord) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO markets
                (market_id, condition_id, question, category, active, closed,
                 resolved, volume, liquidity, end_date, placeholder, last_synced_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)
               ON CONFLICT(market_id) DO UPDATE SET
                 condition_id = excluded.condition_id,
                 question = excluded.question,
                 category = excluded.category,
                 active = excluded.active,
                 closed = excluded.closed,
                 resolved = excluded.resolved,
                 volume = excluded.volume,
                 liquidity = excluded.liquidity,
                 end_date = excluded.end_date,
                 placeholder = 0,
                 last_synced_at = excluded.last_synced_at
            "#,
        )
        .bind(&record.market_id)
        .bind(&record.condition_id)
        .bind(&record.question)
        .bind(&record.category)
        .bind(record.active)
        .bind(record.closed)
        .bind(record.resolved)
        .bind(record.volume)
        .bind(record.liquidity)
        .bind(&record.end_date)
        .bind(&record.last_synced_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Ensure a market row exists for an identifier the gateway has not (yet)
    /// resolved, so the position -> market reference always lands somewhere.
    /// Never overwrites a real row.
    pub async fn upsert_placeholder(&self, market_id: &str, now: &str) -> DbResult<()> {
        sqlx::query(
            r#"INSERT OR IGNORE INTO markets (market_id, question, placeholder, last_synced_at)
               VALUES (?1, '', 1, ?2)"#,
        )
        .bind(market_id)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, market_id: &str) -> DbResult<Option<MarketRecord>> {
        let record = sqlx::query_as::<_, MarketRecord>(
            "SELECT * FROM markets WHERE market_id = ?1",
        )
        .bind(market_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM markets")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}
