use bigdecimal::ToPrimitive;

use crate::config::AnalyzerConfig;
use crate::ingestion::types::RawTransaction;

use super::detectors::{
    BotActivityDetector, PatternDetector, RoundAmountDetector, WhaleMovementDetector,
};
use super::types::{AnalysisResult, Pattern, ScoredTransaction};

pub const VOLUME_ANOMALY_WEIGHT: u32 = 30;

pub const HIGH_RISK_BANNER: &str = "High-risk transaction detected";
pub const MEDIUM_RISK_BANNER: &str = "Medium-risk transaction";
pub const LOW_RISK_BANNER: &str = "Low-risk transaction";
pub const ANALYSIS_UNAVAILABLE: &str = "Analysis temporarily unavailable";

/// Scores raw transactions: volume check, registered pattern detectors,
/// weighted score, insights and confidence.
pub struct RiskAnalyzer {
    decimals: u32,
    volume_threshold: f64,
    baseline_confidence: f64,
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl RiskAnalyzer {
    /// An analyzer with no detectors registered.
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            decimals: config.native_decimals,
            volume_threshold: config.volume_anomaly_threshold,
            baseline_confidence: config.baseline_confidence,
            detectors: Vec::new(),
        }
    }

    /// An analyzer with the reference detectors enabled in `config`.
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let mut analyzer = Self::new(config);

        if config.whale.enabled {
            analyzer.register(WhaleMovementDetector::new(&config.whale, config.native_decimals));
        }
        if config.bot_activity.enabled {
            analyzer.register(BotActivityDetector::new(&config.bot_activity));
        }
        if config.round_amount.enabled {
            analyzer.register(RoundAmountDetector::new(&config.round_amount, config.native_decimals));
        }

        analyzer
    }

    /// Append a detector; detectors run in registration order.
    pub fn register<D: PatternDetector + 'static>(&mut self, detector: D) {
        tracing::debug!(detector = detector.name(), weight = detector.weight(), "Registered pattern detector");
        self.detectors.push(Box::new(detector));
    }

    pub fn with_detector<D: PatternDetector + 'static>(mut self, detector: D) -> Self {
        self.register(detector);
        self
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Analyze a newly ingested transaction, then record it with every
    /// detector so later transactions see it.
    pub fn score(&self, raw: RawTransaction) -> ScoredTransaction {
        let analysis = self.analyze(&raw);
        for detector in &self.detectors {
            detector.observe(&raw);
        }
        ScoredTransaction::new(raw, analysis)
    }

    /// Analyze a transaction again without recording it anywhere.
    pub fn rescore(&self, raw: RawTransaction) -> ScoredTransaction {
        let analysis = self.analyze(&raw);
        ScoredTransaction::new(raw, analysis)
    }

    /// Analyze one transaction. Never fails: internal errors produce the
    /// degraded result. Detector state is read, never written.
    pub fn analyze(&self, tx: &RawTransaction) -> AnalysisResult {
        match self.try_analyze(tx) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(hash = %tx.hash, error = %e, "Analysis failed, returning degraded result");
                degraded_result()
            }
        }
    }

    fn try_analyze(&self, tx: &RawTransaction) -> eyre::Result<AnalysisResult> {
        // Step 1: volume check
        let units = tx.value_in_units(self.decimals)?.to_f64().unwrap_or(0.0);
        let volume_anomaly = units > self.volume_threshold;

        // Step 2: pattern detection, keeping the weight and insight of each hit
        let mut hits: Vec<(Pattern, u32, Option<&str>)> = Vec::new();
        for detector in &self.detectors {
            let detected = detector
                .detect(tx)
                .map_err(|e| eyre::eyre!("Detector '{}' failed: {}", detector.name(), e))?;
            if let Some(pattern) = detected {
                hits.push((pattern, detector.weight(), detector.insight()));
            }
        }

        // Step 3: score
        let mut score: u32 = 0;
        if volume_anomaly {
            score += VOLUME_ANOMALY_WEIGHT;
        }
        for (_, weight, _) in &hits {
            score = score.saturating_add(*weight);
        }
        let risk_score = score.min(100) as u8;

        // Step 4: insights
        let mut insights = vec![severity_banner(risk_score).to_string()];
        insights.extend(hits.iter().filter_map(|(_, _, insight)| insight.map(String::from)));

        // Step 5: confidence
        let patterns: Vec<Pattern> = hits.into_iter().map(|(pattern, _, _)| pattern).collect();
        let ai_confidence = self.confidence(&patterns);

        tracing::debug!(
            hash = %tx.hash,
            risk_score,
            volume_anomaly,
            patterns = patterns.len(),
            "Transaction analyzed"
        );

        Ok(AnalysisResult {
            risk_score,
            patterns,
            insights,
            ai_confidence,
        })
    }

    fn confidence(&self, patterns: &[Pattern]) -> f64 {
        let mean = if patterns.is_empty() {
            0.0
        } else {
            patterns.iter().map(|p| p.confidence).sum::<f64>() / patterns.len() as f64
        };
        ((mean + self.baseline_confidence) / 2.0).clamp(0.0, 1.0)
    }
}

/// Banner insight for a final score.
pub fn severity_banner(risk_score: u8) -> &'static str {
    if risk_score > 70 {
        HIGH_RISK_BANNER
    } else if risk_score >= 40 {
        MEDIUM_RISK_BANNER
    } else {
        LOW_RISK_BANNER
    }
}

/// The result returned when analysis cannot complete.
pub fn degraded_result() -> AnalysisResult {
    AnalysisResult {
        risk_score: 0,
        patterns: Vec::new(),
        insights: vec![ANALYSIS_UNAVAILABLE.to_string()],
        ai_confidence: 0.0,
    }
}
