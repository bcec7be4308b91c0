use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

/// A transaction as delivered by an ingestion source, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTransaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Native-currency base units, arbitrary precision.
    pub value: String,
    pub observed_at: DateTime<Utc>,
    pub block_number: u64,
}

impl RawTransaction {
    /// Parse `value` and convert base units into whole currency units.
    pub fn value_in_units(&self, decimals: u32) -> eyre::Result<BigDecimal> {
        let amount = BigDecimal::from_str(self.value.trim())
            .map_err(|e| eyre::eyre!("Invalid value '{}' for tx {}: {}", self.value, self.hash, e))?;

        if amount < BigDecimal::from(0) {
            return Err(eyre::eyre!(
                "Negative value '{}' for tx {}",
                self.value,
                self.hash
            ));
        }

        Ok(base_to_units(&amount, decimals))
    }
}

/// Convert a raw base-unit amount to whole units using the currency decimals.
pub fn base_to_units(amount: &BigDecimal, decimals: u32) -> BigDecimal {
    let divisor = BigDecimal::from(10u64.pow(decimals));
    amount / divisor
}

/// One transaction inside a feed block notification.
#[derive(Debug, Clone)]
pub struct FeedTransaction {
    pub hash: String,
    pub from: String,
    /// `None` for contract creation.
    pub to: Option<String>,
    pub value: String,
}

/// A block delivered by the live feed, with its transactions in feed order.
#[derive(Debug, Clone)]
pub struct BlockNotification {
    pub block_number: u64,
    pub transactions: Vec<FeedTransaction>,
}
