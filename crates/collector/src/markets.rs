//! Market Collector — dual-source market discovery
//!
//! Gathers every market identifier referenced by a trader's positions and
//! activities and resolves each through the Gateway. The upstream uses two
//! identifier namespaces for the same logical market in some cases, so a
//! "not found" / mismatch answer is an expected outcome, counted and skipped.

use chrono::Utc;
use persistence::repository::market::MarketRecord as MarketRow;
use persistence::repository::MarketRepository;
use persistence::{DbResult, SqlitePool};
use tracing::{debug, warn};

use crate::gateway::{Gateway, GatewayError, MarketRecord};
use crate::types::{is_placeholder_market, NormalizedActivity, ReconciledPosition};

/// Per-run outcome counts for market collection
#[derive(Debug, Default, Clone, Copy)]
pub struct MarketCollectOutcome {
    pub resolved: usize,
    /// Identifiers the gateway answered with NotFound / IdentifierMismatch
    pub skipped: usize,
    /// Genuine failures (exhausted retries, auth) — logged, never fatal here
    pub failed: usize,
}

/// Resolve and upsert every market referenced by the reconciled data.
///
/// Identifier order is positions first, then activities, deduplicated.
pub async fn collect_markets(
    gateway: &dyn Gateway,
    pool: &SqlitePool,
    positions: &[ReconciledPosition],
    activities: &[NormalizedActivity],
) -> DbResult<MarketCollectOutcome> {
    let repo = MarketRepository::new(pool);
    let mut outcome = MarketCollectOutcome::default();

    for market_id in referenced_market_ids(positions, activities) {
        match gateway.fetch_market(&market_id).await {
            Ok(record) => {
                repo.upsert(&to_row(&market_id, record)).await?;
                outcome.resolved += 1;
            }
            Err(GatewayError::NotFound(msg)) | Err(GatewayError::IdentifierMismatch(msg)) => {
                debug!(market_id = %market_id, reason = %msg, "Market identifier unresolvable, skipping");
                outcome.skipped += 1;
            }
            Err(e) => {
                warn!(market_id = %market_id, error = %e, "Market fetch failed");
                outcome.failed += 1;
            }
        }
    }

    debug!(
        resolved = outcome.resolved,
        skipped = outcome.skipped,
        failed = outcome.failed,
        "Market collection finished"
    );

    Ok(outcome)
}

/// Union of market ids from positions (first) and activities, deduplicated,
/// excluding repair-pass placeholders.
pub fn referenced_market_ids(
    positions: &[ReconciledPosition],
    activities: &[NormalizedActivity],
) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let candidates = positions
        .iter()
        .filter_map(|p| p.market_id.as_deref())
        .chain(activities.iter().filter_map(|a| a.market_id.as_deref()));

    for id in candidates {
        if id.is_empty() || is_placeholder_market(id) {
            continue;
        }
        if !seen.iter().any(|s| s == id) {
            seen.push(id.to_string());
        }
    }

    seen
}

fn to_row(requested_id: &str, record: MarketRecord) -> MarketRow {
    let resolved = record.is_resolved();
    MarketRow {
        id: None,
        // Key by the identifier we looked up; the upstream's own id may live
        // in a different namespace
        market_id: requested_id.to_string(),
        condition_id: record.condition_id.or(record.id),
        question: record.question.unwrap_or_default(),
        category: record.category,
        active: record.active.unwrap_or(true) as i64,
        closed: record.closed.unwrap_or(false) as i64,
        resolved: resolved as i64,
        volume: record.volume_num.unwrap_or(0.0),
        liquidity: record.liquidity_num.unwrap_or(0.0),
        end_date: record.end_date,
        placeholder: 0,
        last_synced_at: Some(Utc::now().to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityKind, TradeSide};

    fn position(market: Option<&str>) -> ReconciledPosition {
        ReconciledPosition {
            market_id: market.map(Into::into),
            asset_id: None,
            outcome: None,
            shares: 1.0,
            invested_amount: 1.0,
            avg_entry_price: None,
            current_value: None,
            realized_pnl: None,
            reconstructed: false,
            entered_at: None,
            exited_at: None,
        }
    }

    fn activity(market: Option<&str>) -> NormalizedActivity {
        NormalizedActivity {
            transaction_hash: "0x1".into(),
            market_id: market.map(Into::into),
            asset_id: None,
            kind: ActivityKind::Trade,
            side: Some(TradeSide::Buy),
            outcome: None,
            shares_amount: 1.0,
            cash_amount: 1.0,
            price: None,
            fee_amount: 0.0,
            realized_pnl: None,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_referenced_ids_positions_first_then_activities() {
        let positions = vec![position(Some("0xa")), position(Some("0xb"))];
        let activities = vec![activity(Some("0xb")), activity(Some("0xc"))];
        let ids = referenced_market_ids(&positions, &activities);
        assert_eq!(ids, vec!["0xa", "0xb", "0xc"]);
    }

    #[test]
    fn test_referenced_ids_skip_placeholders() {
        let positions = vec![position(Some("unknown-0xtok")), position(Some("0xa"))];
        let ids = referenced_market_ids(&positions, &[]);
        assert_eq!(ids, vec!["0xa"]);
    }
}
