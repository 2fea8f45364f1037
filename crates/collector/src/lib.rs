//! Trader ingestion and reconciliation pipeline for Polymarket data
//!
//! Collects per-trader activity from the public Polymarket APIs and persists
//! a consistent dataset despite an unreliable upstream:
//! - position reconstruction from trade history when the primary source fails
//! - activity deduplication by transaction hash
//! - post-hoc repair of positions missing a market reference
//! - dual-source market discovery tolerant of identifier mismatches
//! - derived trader statistics (volume, win rate, average position size)

pub mod config;
pub mod gateway;
pub mod ingest;
pub mod markets;
pub mod reconcile;
pub mod stats;
pub mod trader;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use gateway::{Gateway, GatewayError, PolymarketGateway};
pub use ingest::{ingest_activities, IngestOutcome};
pub use markets::{collect_markets, MarketCollectOutcome};
pub use reconcile::{from_primary, reconstruct_from_activities, repair_positions, RepairOutcome};
pub use stats::compute_stats;
pub use trader::{AddressLocks, CollectError, TraderCollector};
pub use types::{
    ActivityKind, NormalizedActivity, ReconciledPosition, TradeSide, TraderDiagnostics,
    TraderStats, TraderSummary,
};
