//! Stats Calculator — trader-level aggregates from reconciled data

use std::collections::HashSet;

use crate::types::{
    is_placeholder_market, ActivityKind, NormalizedActivity, ReconciledPosition, TraderStats,
};

/// Compute derived trader statistics.
///
/// Volume comes from normalized TRADE activities (not raw source fields) so
/// overlapping source formats cannot double-count. Win rate only considers
/// positions whose outcome is determinable (realized PnL known); with none,
/// it stays None rather than pretending 0%.
pub fn compute_stats(
    positions: &[ReconciledPosition],
    activities: &[NormalizedActivity],
) -> TraderStats {
    let trade_activities: Vec<&NormalizedActivity> = activities
        .iter()
        .filter(|a| a.kind == ActivityKind::Trade)
        .collect();

    let total_volume: f64 = trade_activities.iter().map(|a| a.cash_amount.abs()).sum();

    let decided: Vec<f64> = positions.iter().filter_map(|p| p.realized_pnl).collect();
    let win_rate = if decided.is_empty() {
        None
    } else {
        let wins = decided.iter().filter(|pnl| **pnl >= 0.0).count();
        Some(wins as f64 / decided.len() as f64)
    };

    let avg_position_size = if positions.is_empty() {
        0.0
    } else {
        positions.iter().map(|p| p.invested_amount).sum::<f64>() / positions.len() as f64
    };

    // Repair-pass placeholders are not real markets and must not inflate
    // the count
    let markets: HashSet<&str> = positions
        .iter()
        .filter_map(|p| p.market_id.as_deref())
        .chain(activities.iter().filter_map(|a| a.market_id.as_deref()))
        .filter(|id| !is_placeholder_market(id))
        .collect();

    TraderStats {
        total_volume,
        win_rate,
        avg_position_size,
        total_trades: trade_activities.len() as i64,
        markets_traded: markets.len() as i64,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeSide;

    fn position(invested: f64, realized_pnl: Option<f64>) -> ReconciledPosition {
        ReconciledPosition {
            market_id: Some("0xm".into()),
            asset_id: None,
            outcome: None,
            shares: 10.0,
            invested_amount: invested,
            avg_entry_price: None,
            current_value: None,
            realized_pnl,
            reconstructed: false,
            entered_at: None,
            exited_at: None,
        }
    }

    fn trade(cash: f64, kind: ActivityKind) -> NormalizedActivity {
        NormalizedActivity {
            transaction_hash: format!("0x{cash}"),
            market_id: Some("0xm".into()),
            asset_id: None,
            kind,
            side: Some(TradeSide::Buy),
            outcome: None,
            shares_amount: 1.0,
            cash_amount: cash,
            price: None,
            fee_amount: 0.0,
            realized_pnl: None,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_win_rate_excludes_undetermined() {
        // [+5, -3, +2, undetermined] -> 2 non-negative of 3 decided
        let positions = vec![
            position(10.0, Some(5.0)),
            position(10.0, Some(-3.0)),
            position(10.0, Some(2.0)),
            position(10.0, None),
        ];
        let stats = compute_stats(&positions, &[]);
        let win_rate = stats.win_rate.unwrap();
        assert!((win_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_pnl_counts_as_win() {
        let positions = vec![position(10.0, Some(0.0)), position(10.0, Some(-1.0))];
        let stats = compute_stats(&positions, &[]);
        assert_eq!(stats.win_rate, Some(0.5));
    }

    #[test]
    fn test_no_decided_positions_gives_none() {
        let positions = vec![position(10.0, None)];
        assert!(compute_stats(&positions, &[]).win_rate.is_none());
    }

    #[test]
    fn test_volume_only_counts_trades() {
        let activities = vec![
            trade(50.0, ActivityKind::Trade),
            trade(-20.0, ActivityKind::Trade),
            trade(99.0, ActivityKind::Redeem),
        ];
        let stats = compute_stats(&[], &activities);
        assert!((stats.total_volume - 70.0).abs() < 1e-9);
        assert_eq!(stats.total_trades, 2);
    }

    #[test]
    fn test_empty_inputs_are_defined() {
        let stats = compute_stats(&[], &[]);
        assert_eq!(stats.avg_position_size, 0.0);
        assert_eq!(stats.total_volume, 0.0);
        assert!(stats.win_rate.is_none());
        assert_eq!(stats.markets_traded, 0);
    }

    #[test]
    fn test_markets_traded_excludes_placeholders() {
        let mut unlinked = position(10.0, None);
        unlinked.market_id = Some("unknown-0xtok".into());
        let positions = vec![position(10.0, None), unlinked];
        let stats = compute_stats(&positions, &[]);
        assert_eq!(stats.markets_traded, 1);
    }

    #[test]
    fn test_avg_position_size() {
        let positions = vec![position(10.0, None), position(30.0, None)];
        let stats = compute_stats(&positions, &[]);
        assert!((stats.avg_position_size - 20.0).abs() < 1e-9);
    }
}
