//! Position Reconciler — primary-source positions, activity reconstruction,
//! and the market-id repair pass
//!
//! The invariant this module exists to guarantee: every position leaves the
//! repair pass with a market identifier (a placeholder if nothing links it).

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::gateway::PositionRecord;
use crate::types::{
    ActivityKind, NormalizedActivity, ReconciledPosition, TradeSide, PLACEHOLDER_MARKET_PREFIX,
};

const SHARE_EPSILON: f64 = 1e-9;

/// Build positions from the primary (positions endpoint) source
pub fn from_primary(records: Vec<PositionRecord>) -> Vec<ReconciledPosition> {
    records
        .into_iter()
        .map(|r| {
            let invested = r.initial_value.or_else(|| match (r.size, r.avg_price) {
                (Some(s), Some(p)) => Some(s * p),
                _ => None,
            });
            ReconciledPosition {
                market_id: r.condition_id.filter(|id| !id.is_empty()),
                asset_id: r.asset,
                outcome: r.outcome,
                shares: r.size.unwrap_or(0.0),
                invested_amount: invested.unwrap_or(0.0),
                avg_entry_price: r.avg_price,
                current_value: r.current_value,
                realized_pnl: r.realized_pnl,
                reconstructed: false,
                entered_at: None,
                exited_at: None,
            }
        })
        .collect()
}

/// Market ids keyed by the asset token they were seen with, across all
/// activity records
fn asset_market_links(activities: &[NormalizedActivity]) -> HashMap<&str, &str> {
    activities
        .iter()
        .filter_map(|a| match (a.asset_id.as_deref(), a.market_id.as_deref()) {
            (Some(asset), Some(market)) if !market.is_empty() => Some((asset, market)),
            _ => None,
        })
        .collect()
}

/// Rebuild positions from trade activity when the primary source is unusable.
///
/// BUY contributes +shares / +cash, SELL contributes -shares / -cash, applied
/// in timestamp order, so the synthetic position carries net exposure rather
/// than gross turnover. A trade missing its market id still lands in that
/// market's group when any other record links the same asset to it, so one
/// instrument can never split into two positions. Empty input yields an empty
/// set, not an error.
pub fn reconstruct_from_activities(activities: &[NormalizedActivity]) -> Vec<ReconciledPosition> {
    #[derive(Default)]
    struct Net {
        market_id: Option<String>,
        asset_id: Option<String>,
        outcome: Option<String>,
        shares: f64,
        invested: f64,
        buy_shares: f64,
        buy_cash: f64,
        entered_at: Option<i64>,
        exited_at: Option<i64>,
    }

    let mut trades: Vec<&NormalizedActivity> = activities
        .iter()
        .filter(|a| a.kind == ActivityKind::Trade && a.side.is_some())
        .collect();
    trades.sort_by_key(|a| a.timestamp.unwrap_or(0));

    // Resolve every trade's market up front, so records carrying only an
    // asset token merge into the same group as their market-tagged peers
    let links = asset_market_links(activities);

    // BTreeMap keeps reconstruction order stable across runs
    let mut nets: BTreeMap<String, Net> = BTreeMap::new();

    for activity in trades {
        let market = activity
            .market_id
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| activity.asset_id.as_deref().and_then(|a| links.get(a).copied()));

        let key = match (market, activity.asset_id.as_deref()) {
            (Some(market), _) => format!("m:{market}"),
            (None, Some(asset)) => format!("a:{asset}"),
            (None, None) => continue,
        };

        let net = nets.entry(key).or_default();
        if net.market_id.is_none() {
            net.market_id = market.map(str::to_string);
        }
        if net.asset_id.is_none() {
            net.asset_id = activity.asset_id.clone();
        }
        if net.outcome.is_none() {
            net.outcome = activity.outcome.clone();
        }

        match activity.side {
            Some(TradeSide::Buy) => {
                net.shares += activity.shares_amount;
                net.invested += activity.cash_amount;
                net.buy_shares += activity.shares_amount;
                net.buy_cash += activity.cash_amount;
                if net.entered_at.is_none() {
                    net.entered_at = activity.timestamp;
                }
                net.exited_at = None;
            }
            Some(TradeSide::Sell) => {
                net.shares -= activity.shares_amount;
                net.invested -= activity.cash_amount;
                if net.shares.abs() < SHARE_EPSILON {
                    net.exited_at = activity.timestamp;
                }
            }
            None => {}
        }
    }

    let positions: Vec<ReconciledPosition> = nets
        .into_values()
        .map(|net| {
            let exited = net.exited_at.is_some() && net.shares.abs() < SHARE_EPSILON;
            ReconciledPosition {
                market_id: net.market_id,
                asset_id: net.asset_id,
                outcome: net.outcome,
                shares: net.shares,
                invested_amount: net.invested,
                avg_entry_price: if net.buy_shares > 0.0 {
                    Some(net.buy_cash / net.buy_shares)
                } else {
                    None
                },
                current_value: None,
                // A fully exited position realized its net cash flow; an open
                // one has no determinable outcome yet
                realized_pnl: exited.then_some(-net.invested),
                reconstructed: true,
                entered_at: net.entered_at,
                exited_at: net.exited_at,
            }
        })
        .collect();

    debug!(count = positions.len(), "Positions reconstructed from activities");
    positions
}

/// Placeholder market identifier for a position that cannot be linked to any
/// market. Derived from record content, never from payload position, so a
/// reordered but otherwise unchanged upstream response mints the same id.
pub(crate) fn placeholder_market_id(position: &ReconciledPosition) -> String {
    if let Some(asset) = position.asset_id.as_deref() {
        return format!("{PLACEHOLDER_MARKET_PREFIX}{asset}");
    }

    let mut hasher = Sha256::new();
    hasher.update(position.outcome.as_deref().unwrap_or("").as_bytes());
    hasher.update(format!("{}", position.shares).as_bytes());
    hasher.update(format!("{}", position.invested_amount).as_bytes());
    hasher.update(format!("{}", position.avg_entry_price.unwrap_or(0.0)).as_bytes());
    format!("{PLACEHOLDER_MARKET_PREFIX}{:x}", hasher.finalize())
}

/// Result of the repair pass
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RepairOutcome {
    pub repaired: usize,
    pub unresolved: usize,
}

/// Fill missing market identifiers from activity records sharing the same
/// underlying asset. Positions that still cannot be linked get a placeholder
/// identifier and are counted, never dropped.
pub fn repair_positions(
    positions: &mut [ReconciledPosition],
    activities: &[NormalizedActivity],
) -> RepairOutcome {
    let asset_to_market = asset_market_links(activities);

    let mut outcome = RepairOutcome::default();

    for position in positions.iter_mut() {
        if position.market_id.as_deref().is_some_and(|id| !id.is_empty()) {
            continue;
        }

        let linked = position
            .asset_id
            .as_deref()
            .and_then(|asset| asset_to_market.get(asset));

        match linked {
            Some(market) => {
                position.market_id = Some((*market).to_string());
                outcome.repaired += 1;
            }
            None => {
                let placeholder = placeholder_market_id(position);
                warn!(
                    placeholder = %placeholder,
                    "Position could not be linked to a market, assigning placeholder"
                );
                position.market_id = Some(placeholder);
                outcome.unresolved += 1;
            }
        }
    }

    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(
        side: TradeSide,
        shares: f64,
        cash: f64,
        market: Option<&str>,
        asset: Option<&str>,
        ts: i64,
    ) -> NormalizedActivity {
        NormalizedActivity {
            transaction_hash: format!("0x{ts}"),
            market_id: market.map(Into::into),
            asset_id: asset.map(Into::into),
            kind: ActivityKind::Trade,
            side: Some(side),
            outcome: Some("Yes".into()),
            shares_amount: shares,
            cash_amount: cash,
            price: Some(cash / shares),
            fee_amount: 0.0,
            realized_pnl: None,
            timestamp: Some(ts),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_reconstruction_nets_not_gross() {
        // BUY 100 @ 0.50, SELL 40 @ 0.55 -> 60 shares, 50 - 22 = 28 invested
        let activities = vec![
            trade(TradeSide::Buy, 100.0, 50.0, Some("0xm"), Some("0xtok"), 100),
            trade(TradeSide::Sell, 40.0, 22.0, Some("0xm"), Some("0xtok"), 200),
        ];
        let positions = reconstruct_from_activities(&activities);
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert!((p.shares - 60.0).abs() < 1e-9);
        assert!((p.invested_amount - 28.0).abs() < 1e-9);
        assert!(p.reconstructed);
        assert_eq!(p.entered_at, Some(100));
        assert!(p.exited_at.is_none());
        assert!(p.realized_pnl.is_none());
    }

    #[test]
    fn test_reconstruction_applies_in_timestamp_order() {
        // Delivered out of order: the sell arrives first in the payload
        let activities = vec![
            trade(TradeSide::Sell, 100.0, 60.0, Some("0xm"), Some("0xtok"), 300),
            trade(TradeSide::Buy, 100.0, 50.0, Some("0xm"), Some("0xtok"), 100),
        ];
        let positions = reconstruct_from_activities(&activities);
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert!(p.shares.abs() < 1e-9);
        assert_eq!(p.exited_at, Some(300));
        // Fully exited: realized = sell cash - buy cash = 10
        assert_eq!(p.realized_pnl, Some(10.0));
    }

    #[test]
    fn test_reconstruction_empty_input() {
        assert!(reconstruct_from_activities(&[]).is_empty());
    }

    #[test]
    fn test_reconstruction_groups_by_asset_without_market() {
        let activities = vec![
            trade(TradeSide::Buy, 10.0, 5.0, None, Some("0xtok1"), 100),
            trade(TradeSide::Buy, 20.0, 10.0, None, Some("0xtok2"), 200),
        ];
        let positions = reconstruct_from_activities(&activities);
        assert_eq!(positions.len(), 2);
        assert!(positions.iter().all(|p| p.market_id.is_none()));
    }

    #[test]
    fn test_reconstruction_merges_asset_only_trades_into_market_group() {
        // Some records carry the market id, some only the asset token; the
        // instrument must still net into a single position
        let activities = vec![
            trade(TradeSide::Buy, 100.0, 50.0, Some("0xm"), Some("0xtok"), 100),
            trade(TradeSide::Buy, 30.0, 18.0, None, Some("0xtok"), 200),
        ];
        let positions = reconstruct_from_activities(&activities);
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert_eq!(p.market_id.as_deref(), Some("0xm"));
        assert!((p.shares - 130.0).abs() < 1e-9);
        assert!((p.invested_amount - 68.0).abs() < 1e-9);
    }

    #[test]
    fn test_reconstruction_links_asset_seen_before_its_market() {
        // The market-tagged record arrives after the asset-only one
        let activities = vec![
            trade(TradeSide::Buy, 10.0, 5.0, None, Some("0xtok"), 100),
            trade(TradeSide::Sell, 10.0, 6.0, Some("0xm"), Some("0xtok"), 200),
        ];
        let positions = reconstruct_from_activities(&activities);
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert_eq!(p.market_id.as_deref(), Some("0xm"));
        assert!(p.shares.abs() < 1e-9);
        assert_eq!(p.realized_pnl, Some(1.0));
    }

    #[test]
    fn test_repair_fills_market_from_matching_asset() {
        let mut positions = vec![ReconciledPosition {
            market_id: None,
            asset_id: Some("0xtok".into()),
            outcome: Some("Yes".into()),
            shares: 10.0,
            invested_amount: 5.0,
            avg_entry_price: Some(0.5),
            current_value: None,
            realized_pnl: None,
            reconstructed: false,
            entered_at: None,
            exited_at: None,
        }];
        let activities = vec![trade(
            TradeSide::Buy,
            10.0,
            5.0,
            Some("0xmarket"),
            Some("0xtok"),
            100,
        )];

        let outcome = repair_positions(&mut positions, &activities);
        assert_eq!(outcome, RepairOutcome { repaired: 1, unresolved: 0 });
        assert_eq!(positions[0].market_id.as_deref(), Some("0xmarket"));
    }

    #[test]
    fn test_repair_assigns_placeholder_when_unlinkable() {
        let mut positions = vec![ReconciledPosition {
            market_id: None,
            asset_id: Some("0xorphan".into()),
            outcome: None,
            shares: 1.0,
            invested_amount: 1.0,
            avg_entry_price: None,
            current_value: None,
            realized_pnl: None,
            reconstructed: false,
            entered_at: None,
            exited_at: None,
        }];

        let outcome = repair_positions(&mut positions, &[]);
        assert_eq!(outcome, RepairOutcome { repaired: 0, unresolved: 1 });
        assert_eq!(positions[0].market_id.as_deref(), Some("unknown-0xorphan"));
    }

    #[test]
    fn test_placeholder_ids_stable_under_payload_reorder() {
        let unlinkable = |outcome: &str, shares: f64| ReconciledPosition {
            market_id: None,
            asset_id: None,
            outcome: Some(outcome.into()),
            shares,
            invested_amount: shares / 2.0,
            avg_entry_price: Some(0.5),
            current_value: None,
            realized_pnl: None,
            reconstructed: false,
            entered_at: None,
            exited_at: None,
        };

        let mut first = vec![unlinkable("Yes", 10.0), unlinkable("No", 20.0)];
        let mut second = vec![unlinkable("No", 20.0), unlinkable("Yes", 10.0)];
        repair_positions(&mut first, &[]);
        repair_positions(&mut second, &[]);

        let ids = |positions: &[ReconciledPosition]| -> std::collections::HashSet<String> {
            positions.iter().filter_map(|p| p.market_id.clone()).collect()
        };
        let first_ids = ids(&first);
        assert_eq!(first_ids.len(), 2);
        assert!(first_ids.iter().all(|id| id.starts_with("unknown-")));
        // Same records in a different order mint the same identifiers
        assert_eq!(first_ids, ids(&second));
    }

    #[test]
    fn test_primary_positions_keep_market_id() {
        let records = vec![PositionRecord {
            proxy_wallet: Some("0xabc".into()),
            asset: Some("0xtok".into()),
            condition_id: Some("0xm".into()),
            size: Some(100.0),
            avg_price: Some(0.5),
            initial_value: None,
            current_value: Some(60.0),
            cash_pnl: Some(10.0),
            realized_pnl: None,
            cur_price: Some(0.6),
            redeemable: Some(false),
            title: Some("Test".into()),
            outcome: Some("Yes".into()),
            end_date: None,
        }];
        let positions = from_primary(records);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].market_id.as_deref(), Some("0xm"));
        // initial_value absent: invested falls back to size * avg_price
        assert!((positions[0].invested_amount - 50.0).abs() < 1e-9);
        assert!(!positions[0].reconstructed);
    }
}
