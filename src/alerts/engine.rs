use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::analyzer::types::ScoredTransaction;
use crate::config::AlertConfig;

use super::types::{AlertType, RiskAlert};

/// Raises one alert per scored transaction at or above the threshold.
pub struct AlertEngine {
    threshold: u8,
    last_id: AtomicU64,
}

impl AlertEngine {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            threshold: config.threshold,
            last_id: AtomicU64::new(0),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Returns an alert for the sender if the score qualifies.
    pub fn evaluate(&self, tx: &ScoredTransaction) -> Option<RiskAlert> {
        let risk_score = tx.risk_score();
        if risk_score < self.threshold {
            return None;
        }

        let alert = RiskAlert {
            id: self.next_id(),
            wallet_address: tx.raw.from.clone(),
            alert_type: AlertType::HighRiskTransaction,
            severity: risk_score,
            description: format!("High-risk transaction detected: {}% risk score", risk_score),
            created_at: Utc::now(),
            resolved: false,
        };

        tracing::warn!(
            alert_id = %alert.id,
            wallet = %alert.wallet_address,
            hash = %tx.hash(),
            severity = alert.severity,
            "RISK ALERT RAISED"
        );

        Some(alert)
    }

    /// Microsecond clock, bumped past the previous id so ids never repeat.
    fn next_id(&self) -> String {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        format!("alert-{}", now.max(previous + 1))
    }
}
