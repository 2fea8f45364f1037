//! Activity Ingester — normalize, deduplicate, and classify raw activity records
//!
//! Pure transformation: persistence belongs to the orchestrator.

use std::collections::HashSet;

use tracing::debug;

use crate::gateway::ActivityRecord;
use crate::types::{ActivityKind, NormalizedActivity, TradeSide};

/// Result of ingesting one raw activity pull
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub activities: Vec<NormalizedActivity>,
    /// Records dropped because they carry no transaction hash
    pub dropped_missing_tx: usize,
    /// Records collapsed onto an earlier record with the same hash
    pub duplicates: usize,
}

/// Normalize a raw activity sequence into the canonical ledger form.
///
/// Deduplication is by transaction hash, first seen wins. A record without a
/// hash cannot be keyed into the append-only ledger and is dropped (counted,
/// never fatal). Unrecognized action tags are preserved in metadata and
/// classified with a safe default instead of rejecting the record.
pub fn ingest_activities(raw: Vec<ActivityRecord>) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();
    let mut seen: HashSet<String> = HashSet::new();

    for record in raw {
        let tx_hash = match &record.transaction_hash {
            Some(hash) if !hash.is_empty() => hash.clone(),
            _ => {
                outcome.dropped_missing_tx += 1;
                continue;
            }
        };

        if !seen.insert(tx_hash.clone()) {
            outcome.duplicates += 1;
            continue;
        }

        outcome.activities.push(normalize(tx_hash, record));
    }

    debug!(
        ingested = outcome.activities.len(),
        dropped = outcome.dropped_missing_tx,
        duplicates = outcome.duplicates,
        "Activities ingested"
    );

    outcome
}

fn normalize(tx_hash: String, record: ActivityRecord) -> NormalizedActivity {
    let side = record.side.as_deref().and_then(TradeSide::parse);
    let (kind, recognized) = classify(record.activity_type.as_deref(), side);

    let mut metadata = record.extra;
    if !recognized {
        if let Some(tag) = &record.activity_type {
            metadata.insert(
                "rawType".to_string(),
                serde_json::Value::String(tag.clone()),
            );
        }
    }

    let shares = record.size.unwrap_or(0.0);
    let cash = record
        .usdc_size
        .or_else(|| match (record.size, record.price) {
            (Some(s), Some(p)) => Some(s * p),
            _ => None,
        })
        .unwrap_or(0.0);

    NormalizedActivity {
        transaction_hash: tx_hash,
        market_id: record.condition_id,
        asset_id: record.asset,
        kind,
        side,
        outcome: record.outcome,
        shares_amount: shares,
        cash_amount: cash,
        price: record.price,
        fee_amount: record.fee.unwrap_or(0.0),
        realized_pnl: record.realized_pnl,
        timestamp: record.timestamp,
        metadata,
    }
}

/// Map the upstream action tag onto the canonical kind.
///
/// Returns (kind, recognized). An unknown tag falls back to Trade when the
/// record carries a side (it quacks like a fill), Conversion otherwise
/// (Conversion never feeds volume or win-rate math).
fn classify(tag: Option<&str>, side: Option<TradeSide>) -> (ActivityKind, bool) {
    match tag.and_then(ActivityKind::parse) {
        Some(kind) => (kind, true),
        None => {
            let fallback = if side.is_some() {
                ActivityKind::Trade
            } else {
                ActivityKind::Conversion
            };
            (fallback, false)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
