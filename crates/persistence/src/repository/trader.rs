//! Trader repository — profile rows and derived statistics

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted trader row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TraderRecord {
    pub id: Option<i64>,
    pub address: String,
    pub username: Option<String>,
    pub profile_url: Option<String>,
    pub total_volume: f64,
    pub total_trades: i64,
    pub markets_traded: i64,
    pub win_rate: Option<f64>,
    pub avg_position_size: Option<f64>,
    pub first_seen_at: String,
    pub last_synced_at: String,
}

pub struct TraderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TraderRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a trader by address. `first_seen_at` is set on insert only;
    /// every later run just refreshes `last_synced_at`.
    pub async fn upsert(&self, address: &str, profile_url: &str, now: &str) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO traders (address, profile_url, first_seen_at, last_synced_at)
               VALUES (?1, ?2, ?3, ?3)
               ON CONFLICT(address) DO UPDATE SET
                 profile_url = excluded.profile_url,
                 last_synced_at = excluded.last_synced_at
            "#,
        )
        .bind(address)
        .bind(profile_url)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Write derived statistics for an existing trader
    pub async fn update_stats(
        &self,
        address: &str,
        total_volume: f64,
        total_trades: i64,
        markets_traded: i64,
        win_rate: Option<f64>,
        avg_position_size: f64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"UPDATE traders SET
                 total_volume = ?2,
                 total_trades = ?3,
                 markets_traded = ?4,
                 win_rate = ?5,
                 avg_position_size = ?6
               WHERE address = ?1
            "#,
        )
        .bind(address)
        .bind(total_volume)
        .bind(total_trades)
        .bind(markets_traded)
        .bind(win_rate)
        .bind(avg_position_size)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_address(&self, address: &str) -> DbResult<Option<TraderRecord>> {
        let record = sqlx::query_as::<_, TraderRecord>(
            "SELECT * FROM traders WHERE address = ?1",
        )
        .bind(address)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM traders")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}
