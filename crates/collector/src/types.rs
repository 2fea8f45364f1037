//! Core types for the collection pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical classification of a trader activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityKind {
    Trade,
    Split,
    Merge,
    Redeem,
    Reward,
    Conversion,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trade => "TRADE",
            Self::Split => "SPLIT",
            Self::Merge => "MERGE",
            Self::Redeem => "REDEEM",
            Self::Reward => "REWARD",
            Self::Conversion => "CONVERSION",
        }
    }

    /// Parse an upstream action tag. Returns None for tags we do not recognize.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "TRADE" | "BUY" | "SELL" => Some(Self::Trade),
            "SPLIT" => Some(Self::Split),
            "MERGE" => Some(Self::Merge),
            "REDEEM" => Some(Self::Redeem),
            "REWARD" => Some(Self::Reward),
            "CONVERSION" | "CONVERT" => Some(Self::Conversion),
            _ => None,
        }
    }
}

/// Side of a trade activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    pub fn parse(side: &str) -> Option<Self> {
        match side.to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// A normalized, deduplicated activity ledger entry
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedActivity {
    pub transaction_hash: String,
    pub market_id: Option<String>,
    pub asset_id: Option<String>,
    pub kind: ActivityKind,
    pub side: Option<TradeSide>,
    pub outcome: Option<String>,
    pub shares_amount: f64,
    /// Cash value in USD (usdcSize when present, size * price otherwise)
    pub cash_amount: f64,
    pub price: Option<f64>,
    pub fee_amount: f64,
    pub realized_pnl: Option<f64>,
    pub timestamp: Option<i64>,
    /// Opaque source-provided fields, preserved for storage and repair lookups
    pub metadata: Map<String, Value>,
}

/// A trader position after reconciliation
///
/// `market_id` is Option only while the record moves through the pipeline;
/// the repair pass guarantees it is Some (possibly a placeholder) before
/// anything is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciledPosition {
    pub market_id: Option<String>,
    pub asset_id: Option<String>,
    pub outcome: Option<String>,
    pub shares: f64,
    pub invested_amount: f64,
    pub avg_entry_price: Option<f64>,
    pub current_value: Option<f64>,
    /// None means the position's outcome is not determinable yet
    pub realized_pnl: Option<f64>,
    /// True when the position was rebuilt from activity aggregation
    pub reconstructed: bool,
    pub entered_at: Option<i64>,
    pub exited_at: Option<i64>,
}

/// Prefix used for placeholder market identifiers assigned by the repair pass
pub use persistence::PLACEHOLDER_MARKET_PREFIX;

/// Whether a market identifier is a repair-pass placeholder
pub fn is_placeholder_market(market_id: &str) -> bool {
    market_id.starts_with(PLACEHOLDER_MARKET_PREFIX)
}

/// Derived trader-level aggregates
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraderStats {
    pub total_volume: f64,
    /// None when no position has a determinable outcome
    pub win_rate: Option<f64>,
    pub avg_position_size: f64,
    pub total_trades: i64,
    pub markets_traded: i64,
}

/// Per-run result of one trader collection, with diagnostic counts
#[derive(Debug, Clone, Serialize)]
pub struct TraderSummary {
    pub address: String,
    /// True when positions came from activity reconstruction instead of the
    /// primary source
    pub reconstructed: bool,
    pub positions_total: usize,
    pub positions_repaired: usize,
    pub positions_unresolved: usize,
    pub activities_ingested: usize,
    pub activities_new: usize,
    pub activities_duplicates: usize,
    pub activities_dropped: usize,
    pub markets_resolved: usize,
    pub markets_skipped: usize,
    pub markets_failed: usize,
    pub stats: TraderStats,
}

/// Read-only inspection counts for a trader (see `TraderCollector::diagnostics`)
#[derive(Debug, Clone, Serialize)]
pub struct TraderDiagnostics {
    pub address: String,
    pub positions_total: i64,
    pub positions_missing_market: i64,
    pub activities_total: i64,
    pub activities_by_kind: Vec<(String, i64)>,
}

/// Deterministic profile URL for a trader address
pub fn profile_url(address: &str) -> String {
    format!("https://polymarket.com/profile/{address}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_kind_parse() {
        assert_eq!(ActivityKind::parse("TRADE"), Some(ActivityKind::Trade));
        assert_eq!(ActivityKind::parse("redeem"), Some(ActivityKind::Redeem));
        assert_eq!(ActivityKind::parse("CONVERT"), Some(ActivityKind::Conversion));
        assert_eq!(ActivityKind::parse("AIRDROP"), None);
    }

    #[test]
    fn test_placeholder_market() {
        assert!(is_placeholder_market("unknown-0xabc"));
        assert!(!is_placeholder_market("0xdeadbeef"));
    }

    #[test]
    fn test_profile_url() {
        assert_eq!(
            profile_url("0xabc"),
            "https://polymarket.com/profile/0xabc"
        );
    }
}
