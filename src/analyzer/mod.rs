pub mod detectors;
pub mod engine;
pub mod types;

pub use detectors::PatternDetector;
pub use engine::RiskAnalyzer;
pub use types::{AnalysisResult, Pattern, PatternType, ScoredTransaction};
