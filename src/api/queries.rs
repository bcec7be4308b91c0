use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;

use crate::alerts::types::RiskAlert;
use crate::analyzer::types::ScoredTransaction;
use crate::store::{AggregationStore, AnalyticsSummary, RiskBand};

use super::types::*;

/// Newest first by observation time; later insertion wins ties.
fn recent_first(mut txs: Vec<Arc<ScoredTransaction>>) -> Vec<Arc<ScoredTransaction>> {
    txs.reverse();
    txs.sort_by(|a, b| b.raw.observed_at.cmp(&a.raw.observed_at));
    txs
}

fn owned(txs: impl IntoIterator<Item = Arc<ScoredTransaction>>) -> Vec<ScoredTransaction> {
    txs.into_iter().map(|tx| tx.as_ref().clone()).collect()
}

// ============================================================
// Transactions
// ============================================================

pub fn get_transactions(
    store: &AggregationStore,
    risk_level: Option<RiskBand>,
    limit: usize,
    offset: usize,
) -> TransactionsResponse {
    let filtered: Vec<_> = store
        .transactions()
        .into_iter()
        .filter(|tx| risk_level.map_or(true, |band| RiskBand::from_score(tx.risk_score()) == band))
        .collect();

    let total = filtered.len();
    let page = recent_first(filtered).into_iter().skip(offset).take(limit);

    TransactionsResponse {
        transactions: owned(page),
        total,
        limit,
        offset,
    }
}

pub fn get_transaction(store: &AggregationStore, hash: &str) -> Option<ScoredTransaction> {
    store.get_transaction(hash).map(|tx| tx.as_ref().clone())
}

pub fn get_live_transactions(store: &AggregationStore, limit: usize) -> Vec<ScoredTransaction> {
    owned(recent_first(store.transactions()).into_iter().take(limit))
}

// ============================================================
// Wallet Analysis
// ============================================================

pub fn get_wallet_analysis(store: &AggregationStore, address: &str) -> WalletAnalysis {
    let matching = recent_first(
        store
            .transactions()
            .into_iter()
            .filter(|tx| tx.involves(address))
            .collect(),
    );

    if matching.is_empty() {
        return WalletAnalysis {
            address: address.to_string(),
            total_transactions: 0,
            total_volume: "0".to_string(),
            risk_score: 0,
            last_activity: None,
            is_high_risk: false,
            recent_transactions: Vec::new(),
        };
    }

    let mut total_volume = BigDecimal::from(0);
    for tx in &matching {
        match BigDecimal::from_str(tx.raw.value.trim()) {
            Ok(value) => total_volume += value,
            Err(e) => {
                tracing::debug!(hash = %tx.hash(), error = %e, "Skipping unparseable value in wallet volume")
            }
        }
    }

    let count = matching.len();
    let score_sum: u64 = matching.iter().map(|tx| u64::from(tx.risk_score())).sum();
    let mean = score_sum as f64 / count as f64;

    WalletAnalysis {
        address: address.to_string(),
        total_transactions: count,
        total_volume: total_volume.to_string(),
        risk_score: mean.round() as u8,
        last_activity: Some(matching[0].raw.observed_at),
        is_high_risk: mean >= 70.0,
        recent_transactions: owned(matching.into_iter().take(WALLET_RECENT_LIMIT)),
    }
}

// ============================================================
// Alerts & Analytics
// ============================================================

pub fn get_alerts(store: &AggregationStore, params: &AlertParams) -> Vec<RiskAlert> {
    store
        .alerts()
        .into_iter()
        .filter(|alert| params.severity.map_or(true, |s| alert.severity == s))
        .filter(|alert| params.resolved.map_or(true, |r| alert.resolved == r))
        .collect()
}

pub fn get_analytics(store: &AggregationStore) -> AnalyticsSummary {
    store.analytics()
}
