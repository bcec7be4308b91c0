use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Kinds of alert the engine raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    HighRiskTransaction,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighRiskTransaction => "HIGH_RISK_TRANSACTION",
        }
    }
}

impl Serialize for AlertType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A standing record that a wallet crossed the high-risk threshold.
/// Only `resolved` changes after creation, via the store's resolve operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAlert {
    pub id: String,
    pub wallet_address: String,
    pub alert_type: AlertType,
    pub severity: u8,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}
