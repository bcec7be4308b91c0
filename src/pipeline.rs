use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alerts::engine::AlertEngine;
use crate::analyzer::engine::RiskAnalyzer;
use crate::analyzer::types::ScoredTransaction;
use crate::config::Config;
use crate::ingestion::feed::connect_chain_feed;
use crate::ingestion::synthetic::SyntheticGenerator;
use crate::ingestion::types::RawTransaction;
use crate::ingestion::IngestionSource;
use crate::store::AggregationStore;

/// What happened to one ingested transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Stored {
        risk_score: u8,
        alert_id: Option<String>,
    },
    Duplicate,
}

/// Totals for one ingestion run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestionStats {
    pub processed: u64,
    pub stored: u64,
    pub duplicates: u64,
    pub alerts_raised: u64,
}

/// Scoring and alerting in front of the store:
/// 1. Risk analysis
/// 2. Store append (duplicates stop here)
/// 3. Alert evaluation and store
pub struct RiskPipeline {
    analyzer: RiskAnalyzer,
    alert_engine: AlertEngine,
    store: Arc<AggregationStore>,
}

impl RiskPipeline {
    pub fn new(analyzer: RiskAnalyzer, alert_engine: AlertEngine, store: Arc<AggregationStore>) -> Self {
        Self {
            analyzer,
            alert_engine,
            store,
        }
    }

    /// Build the pipeline with the detectors and thresholds from config.
    pub fn from_config(config: &Config, store: Arc<AggregationStore>) -> Self {
        let analyzer = RiskAnalyzer::from_config(&config.analyzer);
        tracing::info!(detectors = ?analyzer.detector_names(), "Risk analyzer initialized");
        Self::new(analyzer, AlertEngine::new(&config.alerts), store)
    }

    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }

    /// Score, store and alert on one transaction.
    pub fn process(&self, raw: RawTransaction) -> ProcessOutcome {
        let scored = Arc::new(self.analyzer.score(raw));
        let risk_score = scored.risk_score();

        if !self.store.append(scored.clone()) {
            return ProcessOutcome::Duplicate;
        }

        let alert_id = self.alert_engine.evaluate(&scored).map(|alert| {
            let id = alert.id.clone();
            self.store.append_alert(alert);
            id
        });

        tracing::info!(
            hash = %scored.hash(),
            block = scored.raw.block_number,
            risk_score,
            patterns = scored.analysis.patterns.len(),
            alert = alert_id.is_some(),
            "Transaction processed"
        );

        ProcessOutcome::Stored { risk_score, alert_id }
    }

    /// Score a stored transaction again without touching the store.
    pub fn reanalyze(&self, hash: &str) -> Option<ScoredTransaction> {
        let stored = self.store.get_transaction(hash)?;
        Some(self.analyzer.rescore(stored.raw.clone()))
    }
}

/// Drive one source through the pipeline until shutdown or the source ends.
///
/// Transactions are processed one at a time in arrival order. Cancelling
/// `shutdown` stops the source; a transaction already being processed is
/// finished first.
pub async fn run_ingestion(
    source: Box<dyn IngestionSource>,
    pipeline: Arc<RiskPipeline>,
    shutdown: CancellationToken,
) -> IngestionStats {
    let name = source.name().to_string();
    let mut stream = source.into_stream(shutdown.clone());
    let mut stats = IngestionStats::default();

    tracing::info!(source = %name, "Ingestion started");

    while let Some(raw) = stream.next().await {
        stats.processed += 1;
        match pipeline.process(raw) {
            ProcessOutcome::Stored { alert_id, .. } => {
                stats.stored += 1;
                if alert_id.is_some() {
                    stats.alerts_raised += 1;
                }
            }
            ProcessOutcome::Duplicate => stats.duplicates += 1,
        }

        if shutdown.is_cancelled() {
            break;
        }
    }

    tracing::info!(
        source = %name,
        processed = stats.processed,
        stored = stats.stored,
        duplicates = stats.duplicates,
        alerts = stats.alerts_raised,
        "Ingestion stopped"
    );

    stats
}

/// Start every configured source, each driven by its own task.
///
/// A live feed that cannot be reached is an error when it is the only
/// source; next to the synthetic generator it is logged and skipped.
pub async fn start_ingestion(
    config: &Config,
    pipeline: Arc<RiskPipeline>,
    shutdown: CancellationToken,
) -> eyre::Result<Vec<JoinHandle<IngestionStats>>> {
    let mut sources: Vec<(Box<dyn IngestionSource>, Option<JoinHandle<()>>)> = Vec::new();

    if config.ingestion.synthetic {
        let generator = SyntheticGenerator::new(&config.ingestion, config.analyzer.native_decimals);
        sources.push((Box::new(generator), None));
    }

    if let Some(feed_config) = config.feed.clone() {
        match connect_chain_feed(feed_config, shutdown.clone()).await {
            Ok((feed, producer)) => sources.push((Box::new(feed), Some(producer))),
            Err(e) if sources.is_empty() => {
                return Err(eyre::eyre!("Failed to start ingestion: {}", e));
            }
            Err(e) => {
                tracing::error!(error = %e, "Live feed unavailable, continuing with synthetic ingestion only");
            }
        }
    }

    let handles = sources
        .into_iter()
        .map(|(source, producer)| {
            let pipeline = pipeline.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let stats = run_ingestion(source, pipeline, shutdown).await;
                if let Some(producer) = producer {
                    let _ = producer.await;
                }
                stats
            })
        })
        .collect();

    Ok(handles)
}
