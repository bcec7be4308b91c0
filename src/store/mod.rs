pub mod analytics;
pub mod ledger;

pub use analytics::{AnalyticsSummary, RiskBand};
pub use ledger::AggregationStore;
