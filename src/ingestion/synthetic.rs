use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::IngestionConfig;

use super::types::RawTransaction;
use super::IngestionSource;

/// Emits one pseudo-random transaction per interval, drawing counterparties
/// from a fixed address pool.
pub struct SyntheticGenerator {
    interval: Duration,
    address_pool: Vec<String>,
    max_base_units: u128,
    next_block: u64,
    rng: StdRng,
}

impl SyntheticGenerator {
    pub fn new(config: &IngestionConfig, native_decimals: u32) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let max_base_units = u128::from(config.max_value_units)
            .checked_mul(10u128.pow(native_decimals))
            .unwrap_or(u128::MAX);

        Self {
            interval: Duration::from_millis(config.interval_ms),
            address_pool: config.address_pool.clone(),
            max_base_units,
            next_block: config.start_block,
            rng,
        }
    }

    /// Produce the next transaction without waiting for the timer.
    pub fn next_transaction(&mut self) -> RawTransaction {
        let hash_bytes: [u8; 32] = self.rng.gen();
        let from = self.pick_address();
        let to = self.pick_address();
        let value = if self.max_base_units == 0 {
            0
        } else {
            self.rng.gen_range(0..self.max_base_units)
        };

        let block_number = self.next_block;
        self.next_block += 1;

        RawTransaction {
            hash: format!("0x{}", hex::encode(hash_bytes)),
            from,
            to,
            value: value.to_string(),
            observed_at: Utc::now(),
            block_number,
        }
    }

    fn pick_address(&mut self) -> String {
        let idx = self.rng.gen_range(0..self.address_pool.len());
        self.address_pool[idx].clone()
    }
}

impl IngestionSource for SyntheticGenerator {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn into_stream(self: Box<Self>, shutdown: CancellationToken) -> BoxStream<'static, RawTransaction> {
        let period = self.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms = period.as_millis() as u64, "Synthetic generator started");

        stream::unfold((*self, ticker, shutdown), |(mut generator, mut ticker, shutdown)| async move {
            let ticked = tokio::select! {
                biased;
                _ = shutdown.cancelled() => false,
                _ = ticker.tick() => true,
            };

            if !ticked {
                tracing::info!("Shutdown received, stopping synthetic generator");
                return None;
            }

            let tx = generator.next_transaction();
            tracing::debug!(hash = %tx.hash, block = tx.block_number, "Generated synthetic transaction");
            Some((tx, (generator, ticker, shutdown)))
        })
        .boxed()
    }
}
