pub mod handlers;
pub mod queries;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::broadcast::BroadcastHub;
use crate::pipeline::RiskPipeline;
use crate::store::AggregationStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AggregationStore>,
    pub hub: Arc<BroadcastHub>,
    pub pipeline: Arc<RiskPipeline>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/analytics", get(handlers::analytics))
        .route("/api/v1/transactions", get(handlers::list_transactions))
        .route("/api/v1/transactions/live", get(handlers::live_transactions))
        .route("/api/v1/transactions/{hash}", get(handlers::transaction))
        .route(
            "/api/v1/transactions/{hash}/analyze",
            post(handlers::analyze_transaction),
        )
        .route("/api/v1/wallet/{address}", get(handlers::wallet_analysis))
        .route("/api/v1/alerts", get(handlers::list_alerts))
        .route("/api/v1/alerts/{id}/resolve", post(handlers::resolve_alert))
        .route("/api/v1/subscribe/{topic}", get(handlers::subscribe))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the API listener. Called before any task is spawned so a busy or
/// invalid address fails startup.
pub async fn bind(host: &str, port: u16) -> eyre::Result<TcpListener> {
    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre::eyre!("Failed to bind API server to {}: {}", addr, e))
}

pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let app = router(state);
    tracing::info!(addr = %listener.local_addr()?, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
