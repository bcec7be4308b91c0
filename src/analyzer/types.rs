use serde::{Serialize, Serializer};

use crate::ingestion::types::RawTransaction;

/// Kinds of pattern the detectors can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternType {
    WhaleMovement,
    BotActivity,
    RoundAmount,
    VolumeAnomaly,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhaleMovement => "whale_movement",
            Self::BotActivity => "bot_activity",
            Self::RoundAmount => "round_amount",
            Self::VolumeAnomaly => "volume_anomaly",
        }
    }
}

impl Serialize for PatternType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub description: String,
}

/// The scored fields produced by the analyzer for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub risk_score: u8,
    pub patterns: Vec<Pattern>,
    pub insights: Vec<String>,
    pub ai_confidence: f64,
}

/// A raw transaction together with its analysis. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTransaction {
    #[serde(flatten)]
    pub raw: RawTransaction,
    #[serde(flatten)]
    pub analysis: AnalysisResult,
}

impl ScoredTransaction {
    pub fn new(raw: RawTransaction, analysis: AnalysisResult) -> Self {
        Self { raw, analysis }
    }

    pub fn hash(&self) -> &str {
        &self.raw.hash
    }

    pub fn risk_score(&self) -> u8 {
        self.analysis.risk_score
    }

    /// True if the address is either the sender or the receiver.
    pub fn involves(&self, address: &str) -> bool {
        self.raw.from.eq_ignore_ascii_case(address) || self.raw.to.eq_ignore_ascii_case(address)
    }
}
