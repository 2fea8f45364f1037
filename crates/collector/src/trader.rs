//! Trader Collector — orchestrates one idempotent collection run per trader
//!
//! Stage order: fetch positions -> reconstruct if needed -> ingest activities
//! -> repair positions -> collect markets (optional) -> compute stats ->
//! persist. Every stage degrades to its fallback or an empty result; only a
//! completely unreachable gateway aborts the run.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::Utc;
use persistence::repository::{
    ActivityRecord as ActivityRow, ActivityRepository, MarketRepository,
    PositionRecord as PositionRow, PositionRepository, TraderRepository,
};
use persistence::{Database, DbError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::gateway::{Gateway, GatewayError};
use crate::ingest::ingest_activities;
use crate::markets::collect_markets;
use crate::reconcile::{
    from_primary, placeholder_market_id, reconstruct_from_activities, repair_positions,
};
use crate::stats::compute_stats;
use crate::types::{
    profile_url, NormalizedActivity, ReconciledPosition, TraderDiagnostics, TraderSummary,
};

/// Errors that terminate a trader's collection run
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("collection already in progress for {0}")]
    AlreadyRunning(String),

    #[error("gateway unreachable: {0}")]
    GatewayUnreachable(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

// ---------------------------------------------------------------------------
// Single-flight per address
// ---------------------------------------------------------------------------

/// Advisory single-flight registry: at most one in-progress run per address.
/// The lease is released on drop, so a panicking run cannot wedge an address.
#[derive(Default)]
pub struct AddressLocks {
    in_flight: Mutex<HashSet<String>>,
}

impl AddressLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, address: &str) -> Option<AddressLease<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if in_flight.insert(address.to_string()) {
            Some(AddressLease {
                locks: self,
                address: address.to_string(),
            })
        } else {
            None
        }
    }
}

/// RAII lease held for the duration of one collection run
pub struct AddressLease<'a> {
    locks: &'a AddressLocks,
    address: String,
}

impl Drop for AddressLease<'_> {
    fn drop(&mut self) {
        self.locks.in_flight.lock().unwrap().remove(&self.address);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Collects and persists one trader's positions, activities, markets, and
/// derived statistics.
pub struct TraderCollector<'a> {
    gateway: &'a dyn Gateway,
    db: &'a Database,
    locks: &'a AddressLocks,
    rate_limit_ms: u64,
}

impl<'a> TraderCollector<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        db: &'a Database,
        locks: &'a AddressLocks,
        config: &Config,
    ) -> Self {
        Self {
            gateway,
            db,
            locks,
            rate_limit_ms: config.rate_limit_ms,
        }
    }

    /// Run one collection for `address`. Re-invoking with unchanged upstream
    /// data converges to the same persisted state (upserts by natural key
    /// throughout).
    pub async fn collect(
        &self,
        address: &str,
        with_markets: bool,
    ) -> Result<TraderSummary, CollectError> {
        let _lease = self
            .locks
            .try_acquire(address)
            .ok_or_else(|| CollectError::AlreadyRunning(address.to_string()))?;

        info!(address, with_markets, "Collecting trader");

        // FETCH_POSITIONS — None means the primary source is unusable for
        // this run and positions must be reconstructed from activities
        let primary = match self.gateway.fetch_positions(address).await {
            Ok(records) => Some(records),
            Err(GatewayError::Unreachable(msg)) => {
                return Err(CollectError::GatewayUnreachable(msg))
            }
            Err(e @ GatewayError::Permission(_)) | Err(e @ GatewayError::Transient(_)) => {
                warn!(address, error = %e, "Primary position source unavailable, reconstructing from activities");
                None
            }
            Err(e) => {
                warn!(address, error = %e, "Position fetch returned no usable data");
                Some(Vec::new())
            }
        };

        // INGEST_ACTIVITIES
        let raw_activities = match self.gateway.fetch_activities(address).await {
            Ok(records) => records,
            Err(GatewayError::Unreachable(msg)) => {
                return Err(CollectError::GatewayUnreachable(msg))
            }
            Err(e) => {
                warn!(address, error = %e, "Activity fetch failed, continuing with empty history");
                Vec::new()
            }
        };
        let ingest = ingest_activities(raw_activities);

        // RECONSTRUCT_IF_NEEDED
        let (mut positions, reconstructed) = match primary {
            Some(records) => (from_primary(records), false),
            None => (reconstruct_from_activities(&ingest.activities), true),
        };

        // REPAIR_POSITIONS
        let repair = repair_positions(&mut positions, &ingest.activities);
        if repair.unresolved > 0 {
            warn!(
                address,
                unresolved = repair.unresolved,
                "Positions persisted with placeholder market references"
            );
        }

        // COLLECT_MARKETS
        let market_outcome = if with_markets {
            collect_markets(self.gateway, self.db.pool(), &positions, &ingest.activities).await?
        } else {
            Default::default()
        };

        // COMPUTE_STATS
        let stats = compute_stats(&positions, &ingest.activities);

        // PERSIST
        let now = Utc::now().to_rfc3339();
        let pool = self.db.pool();

        TraderRepository::new(pool)
            .upsert(address, &profile_url(address), &now)
            .await?;

        // Every position must resolve to a market row; identifiers the
        // collector did not (or was not asked to) resolve get placeholders
        let market_repo = MarketRepository::new(pool);
        let mut seen_markets: HashSet<&str> = HashSet::new();
        for position in &positions {
            if let Some(market_id) = position.market_id.as_deref() {
                if seen_markets.insert(market_id) {
                    market_repo.upsert_placeholder(market_id, &now).await?;
                }
            }
        }

        let position_rows: Vec<PositionRow> = positions
            .iter()
            .map(|p| position_to_row(address, p, &now))
            .collect();
        PositionRepository::new(pool).upsert_all(&position_rows).await?;

        let activity_rows: Vec<ActivityRow> = ingest
            .activities
            .iter()
            .map(|a| activity_to_row(address, a))
            .collect();
        let activities_new = ActivityRepository::new(pool)
            .insert_ignore_all(&activity_rows)
            .await?;

        TraderRepository::new(pool)
            .update_stats(
                address,
                stats.total_volume,
                stats.total_trades,
                stats.markets_traded,
                stats.win_rate,
                stats.avg_position_size,
            )
            .await?;

        let summary = TraderSummary {
            address: address.to_string(),
            reconstructed,
            positions_total: positions.len(),
            positions_repaired: repair.repaired,
            positions_unresolved: repair.unresolved,
            activities_ingested: ingest.activities.len(),
            activities_new,
            activities_duplicates: ingest.duplicates,
            activities_dropped: ingest.dropped_missing_tx,
            markets_resolved: market_outcome.resolved,
            markets_skipped: market_outcome.skipped,
            markets_failed: market_outcome.failed,
            stats,
        };

        info!(
            address,
            positions = summary.positions_total,
            activities = summary.activities_ingested,
            new_activities = summary.activities_new,
            markets_resolved = summary.markets_resolved,
            markets_skipped = summary.markets_skipped,
            "Trader collection complete"
        );

        Ok(summary)
    }

    /// Collect a batch of addresses sequentially. A failed trader is logged
    /// and skipped; the batch continues. Returns how many succeeded.
    pub async fn collect_batch(&self, addresses: &[String], with_markets: bool) -> usize {
        let mut collected = 0usize;

        for (i, address) in addresses.iter().enumerate() {
            match self.collect(address, with_markets).await {
                Ok(_) => collected += 1,
                Err(e) => {
                    error!(address, error = %e, "Failed to collect trader");
                }
            }

            // Rate limit between traders
            if i + 1 < addresses.len() {
                tokio::time::sleep(std::time::Duration::from_millis(self.rate_limit_ms)).await;
            }
        }

        info!(collected, total = addresses.len(), "Batch collection finished");
        collected
    }

    /// Read-only inspection counts for external debugging tooling
    pub async fn diagnostics(&self, address: &str) -> Result<TraderDiagnostics, CollectError> {
        let pool = self.db.pool();
        let position_repo = PositionRepository::new(pool);
        let activity_repo = ActivityRepository::new(pool);

        Ok(TraderDiagnostics {
            address: address.to_string(),
            positions_total: position_repo.count_for_trader(address).await?,
            positions_missing_market: position_repo.count_missing_market(address).await?,
            activities_total: activity_repo.count_for_trader(address).await?,
            activities_by_kind: activity_repo.count_by_kind(address).await?,
        })
    }
}

// ---------------------------------------------------------------------------
// Row conversions
// ---------------------------------------------------------------------------

fn position_to_row(address: &str, position: &ReconciledPosition, now: &str) -> PositionRow {
    PositionRow {
        id: None,
        trader_address: address.to_string(),
        market_id: position
            .market_id
            .clone()
            .unwrap_or_else(|| placeholder_market_id(position)),
        outcome: position.outcome.clone().unwrap_or_default(),
        shares: position.shares,
        invested_amount: position.invested_amount,
        avg_entry_price: position.avg_entry_price,
        current_value: position.current_value,
        realized_pnl: position.realized_pnl,
        reconstructed: position.reconstructed as i64,
        entered_at: position.entered_at,
        exited_at: position.exited_at,
        last_updated: Some(now.to_string()),
    }
}

fn activity_to_row(address: &str, activity: &NormalizedActivity) -> ActivityRow {
    let metadata = if activity.metadata.is_empty() {
        None
    } else {
        serde_json::to_string(&activity.metadata).ok()
    };

    ActivityRow {
        id: None,
        transaction_hash: activity.transaction_hash.clone(),
        trader_address: address.to_string(),
        market_id: activity.market_id.clone(),
        activity_type: activity.kind.as_str().to_string(),
        side: activity.side.map(|s| s.as_str().to_string()),
        outcome: activity.outcome.clone(),
        shares_amount: activity.shares_amount,
        cash_amount: activity.cash_amount,
        price: activity.price,
        fee_amount: activity.fee_amount,
        realized_pnl: activity.realized_pnl,
        asset_id: activity.asset_id.clone(),
        timestamp: activity.timestamp,
        metadata,
        created_at: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
