use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

/// Risk band used by transaction queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    High,
    Medium,
    Low,
}

impl RiskBand {
    pub fn from_score(risk_score: u8) -> Self {
        if risk_score >= 70 {
            Self::High
        } else if risk_score >= 40 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl FromStr for RiskBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            other => Err(format!("Unknown risk level '{}', expected HIGH, MEDIUM or LOW", other)),
        }
    }
}

/// Running totals over every stored transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_transactions: u64,
    pub critical_risk: u64,
    pub high_risk: u64,
    pub medium_risk: u64,
    pub low_risk: u64,
    pub average_risk_score: f64,
    pub last_updated: DateTime<Utc>,
}

impl AnalyticsSummary {
    pub fn new() -> Self {
        Self {
            total_transactions: 0,
            critical_risk: 0,
            high_risk: 0,
            medium_risk: 0,
            low_risk: 0,
            average_risk_score: 0.0,
            last_updated: Utc::now(),
        }
    }
}

impl Default for AnalyticsSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental analytics: tier counters plus an exact score sum for the mean.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsTracker {
    summary: AnalyticsSummary,
    score_sum: u64,
}

impl AnalyticsTracker {
    /// Tiers: critical >= 80, high >= 60, medium >= 40, low otherwise.
    pub fn record(&mut self, risk_score: u8) {
        let s = &mut self.summary;
        s.total_transactions += 1;
        match risk_score {
            80.. => s.critical_risk += 1,
            60..=79 => s.high_risk += 1,
            40..=59 => s.medium_risk += 1,
            _ => s.low_risk += 1,
        }

        self.score_sum += u64::from(risk_score);
        s.average_risk_score = self.score_sum as f64 / s.total_transactions as f64;
        s.last_updated = Utc::now();
    }

    pub fn summary(&self) -> &AnalyticsSummary {
        &self.summary
    }
}
