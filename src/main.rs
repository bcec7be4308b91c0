use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chainwatch_insights::api::AppState;
use chainwatch_insights::broadcast::BroadcastHub;
use chainwatch_insights::config::Config;
use chainwatch_insights::pipeline::{start_ingestion, RiskPipeline};
use chainwatch_insights::store::AggregationStore;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("ChainWatch Insights starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        synthetic = config.ingestion.synthetic,
        feed = config.feed.is_some(),
        "Configuration loaded from {}",
        config_path
    );

    let hub = Arc::new(BroadcastHub::new(config.broadcast.buffer_size));
    let store = Arc::new(AggregationStore::with_hub(hub.clone()));
    let pipeline = Arc::new(RiskPipeline::from_config(&config, store.clone()));

    let shutdown = CancellationToken::new();

    if config.api.enabled {
        let listener = chainwatch_insights::api::bind(&config.api.host, config.api.port).await?;
        let state = AppState {
            store: store.clone(),
            hub: hub.clone(),
            pipeline: pipeline.clone(),
        };
        let api_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = chainwatch_insights::api::serve(listener, state, api_shutdown).await {
                tracing::error!(error = %e, "API server failed");
            }
        });
    }

    let handles = match start_ingestion(&config, pipeline.clone(), shutdown.clone()).await {
        Ok(handles) => handles,
        Err(e) => {
            shutdown.cancel();
            return Err(e);
        }
    };

    tracing::info!("Ingestion started. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping ingestion...");
    shutdown.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    let summary = store.analytics();
    tracing::info!(
        transactions = summary.total_transactions,
        alerts = store.alert_count(),
        average_risk = summary.average_risk_score,
        "ChainWatch Insights stopped gracefully"
    );
    Ok(())
}
