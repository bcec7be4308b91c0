use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::config::{BotActivityConfig, RoundAmountConfig, WhaleConfig, MAX_BOT_WINDOW_SECS};
use crate::ingestion::types::RawTransaction;

use super::types::{Pattern, PatternType};

/// A single pattern heuristic.
///
/// Each detector owns its score weight and insight text so the analyzer can
/// aggregate any registered set without knowing the individual rules.
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Points added to the risk score when this detector fires.
    fn weight(&self) -> u32;

    /// Insight appended after the severity banner when this detector fires.
    fn insight(&self) -> Option<&str> {
        None
    }

    /// Evaluate `tx` against the current state. Must not change that state.
    fn detect(&self, tx: &RawTransaction) -> eyre::Result<Option<Pattern>>;

    /// Record a live transaction into any state later detections read.
    fn observe(&self, _tx: &RawTransaction) {}
}

/// Flags transfers at or above the whale threshold.
pub struct WhaleMovementDetector {
    threshold: f64,
    decimals: u32,
}

impl WhaleMovementDetector {
    pub fn new(config: &WhaleConfig, decimals: u32) -> Self {
        Self {
            threshold: config.threshold,
            decimals,
        }
    }
}

impl PatternDetector for WhaleMovementDetector {
    fn name(&self) -> &'static str {
        "whale_movement"
    }

    fn weight(&self) -> u32 {
        20
    }

    fn insight(&self) -> Option<&str> {
        Some("Whale activity may impact market")
    }

    fn detect(&self, tx: &RawTransaction) -> eyre::Result<Option<Pattern>> {
        let units = to_f64(&tx.value_in_units(self.decimals)?);

        if units < self.threshold {
            return Ok(None);
        }

        Ok(Some(Pattern {
            pattern_type: PatternType::WhaleMovement,
            confidence: 0.85,
            description: format!("Large holder activity detected: {:.2} units moved", units),
        }))
    }
}

const MAX_TRACKED_SENDERS: usize = 10_000;

/// Flags senders issuing many transactions within a short window.
pub struct BotActivityDetector {
    window: Duration,
    max_transactions: usize,
    history: Mutex<HashMap<String, VecDeque<(DateTime<Utc>, String)>>>,
}

impl BotActivityDetector {
    pub fn new(config: &BotActivityConfig) -> Self {
        Self {
            window: Duration::seconds(config.window_secs.min(MAX_BOT_WINDOW_SECS) as i64),
            max_transactions: config.max_transactions.max(1),
            history: Mutex::new(HashMap::new()),
        }
    }
}

impl PatternDetector for BotActivityDetector {
    fn name(&self) -> &'static str {
        "bot_activity"
    }

    fn weight(&self) -> u32 {
        15
    }

    fn insight(&self) -> Option<&str> {
        Some("Automated trading detected")
    }

    /// Counts the sender's recorded transactions inside
    /// `(observed_at - window, observed_at]`, plus `tx` itself.
    fn detect(&self, tx: &RawTransaction) -> eyre::Result<Option<Pattern>> {
        let cutoff = tx.observed_at - self.window;
        let history = self.history.lock();

        let prior = history.get(&tx.from.to_ascii_lowercase()).map_or(0, |seen| {
            seen.iter()
                .filter(|(at, hash)| *at > cutoff && *at <= tx.observed_at && *hash != tx.hash)
                .count()
        });
        let count = prior + 1;

        if count < self.max_transactions {
            return Ok(None);
        }

        Ok(Some(Pattern {
            pattern_type: PatternType::BotActivity,
            confidence: 0.78,
            description: format!(
                "Automated trading pattern: {} transactions in {}s",
                count,
                self.window.num_seconds()
            ),
        }))
    }

    fn observe(&self, tx: &RawTransaction) {
        let mut history = self.history.lock();

        if history.len() >= MAX_TRACKED_SENDERS {
            let cutoff = tx.observed_at - self.window;
            history.retain(|_, seen| seen.back().is_some_and(|(at, _)| *at > cutoff));
        }

        let seen = history.entry(tx.from.to_ascii_lowercase()).or_default();
        if seen.iter().any(|(_, hash)| *hash == tx.hash) {
            return;
        }

        // Kept sorted by observation time so expiry only looks at the front.
        let pos = seen.partition_point(|(at, _)| *at <= tx.observed_at);
        seen.insert(pos, (tx.observed_at, tx.hash.clone()));

        if let Some(newest) = seen.back().map(|(at, _)| *at) {
            let cutoff = newest - self.window;
            while seen.front().is_some_and(|(at, _)| *at <= cutoff) {
                seen.pop_front();
            }
        }
    }
}

/// Flags exact multiples of a round unit, typical of OTC settlement.
pub struct RoundAmountDetector {
    unit: BigDecimal,
    decimals: u32,
}

impl RoundAmountDetector {
    pub fn new(config: &RoundAmountConfig, decimals: u32) -> Self {
        Self {
            unit: BigDecimal::from(config.unit),
            decimals,
        }
    }
}

impl PatternDetector for RoundAmountDetector {
    fn name(&self) -> &'static str {
        "round_amount"
    }

    fn weight(&self) -> u32 {
        10
    }

    fn insight(&self) -> Option<&str> {
        Some("Round-amount transfer consistent with OTC settlement")
    }

    fn detect(&self, tx: &RawTransaction) -> eyre::Result<Option<Pattern>> {
        let units = tx.value_in_units(self.decimals)?;

        if units < self.unit || (&units % &self.unit) != BigDecimal::from(0) {
            return Ok(None);
        }

        Ok(Some(Pattern {
            pattern_type: PatternType::RoundAmount,
            confidence: 0.6,
            description: format!("Round amount of {} units", units.normalized()),
        }))
    }
}

fn to_f64(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
