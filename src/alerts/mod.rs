pub mod engine;
pub mod types;

pub use engine::AlertEngine;
pub use types::{AlertType, RiskAlert};
