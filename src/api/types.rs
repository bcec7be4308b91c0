use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::types::ScoredTransaction;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1000;
pub const DEFAULT_LIVE_LIMIT: usize = 10;
pub const WALLET_RECENT_LIMIT: usize = 10;

// ============================================================
// Query params
// ============================================================

#[derive(Debug, Default, Deserialize)]
pub struct TransactionParams {
    pub risk_level: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertParams {
    pub severity: Option<u8>,
    pub resolved: Option<bool>,
}

// ============================================================
// Response types
// ============================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub total_transactions: usize,
    pub total_alerts: usize,
    pub subscribers: usize,
    pub dropped_events: u64,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<ScoredTransaction>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct WalletAnalysis {
    pub address: String,
    pub total_transactions: usize,
    /// Summed base-unit value, arbitrary precision.
    pub total_volume: String,
    pub risk_score: u8,
    pub last_activity: Option<DateTime<Utc>>,
    pub is_high_risk: bool,
    pub recent_transactions: Vec<ScoredTransaction>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
