use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;

use crate::alerts::types::RiskAlert;
use crate::analyzer::types::ScoredTransaction;
use crate::broadcast::Topic;
use crate::store::{AnalyticsSummary, RiskBand};

use super::queries;
use super::types::*;
use super::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

// ============================================================
// Health & Analytics
// ============================================================

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let subscribers = Topic::ALL
        .into_iter()
        .map(|topic| state.hub.subscriber_count(topic))
        .sum();

    Json(HealthResponse {
        status: "ok".to_string(),
        total_transactions: state.store.transaction_count(),
        total_alerts: state.store.alert_count(),
        subscribers,
        dropped_events: state.hub.dropped_events(),
    })
}

pub async fn analytics(State(state): State<Arc<AppState>>) -> Json<AnalyticsSummary> {
    Json(queries::get_analytics(&state.store))
}

// ============================================================
// Transactions
// ============================================================

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionParams>,
) -> ApiResult<TransactionsResponse> {
    let band = params
        .risk_level
        .as_deref()
        .map(str::parse::<RiskBand>)
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    Ok(Json(queries::get_transactions(&state.store, band, limit, offset)))
}

pub async fn live_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LiveParams>,
) -> Json<Vec<ScoredTransaction>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIVE_LIMIT).min(MAX_LIMIT);
    Json(queries::get_live_transactions(&state.store, limit))
}

pub async fn transaction(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> ApiResult<ScoredTransaction> {
    queries::get_transaction(&state.store, &hash)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Transaction {} not found", hash)))
}

pub async fn analyze_transaction(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> ApiResult<ScoredTransaction> {
    state
        .pipeline
        .reanalyze(&hash)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Transaction {} not found", hash)))
}

// ============================================================
// Wallet
// ============================================================

pub async fn wallet_analysis(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Json<WalletAnalysis> {
    Json(queries::get_wallet_analysis(&state.store, &address))
}

// ============================================================
// Alerts
// ============================================================

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertParams>,
) -> Json<Vec<RiskAlert>> {
    Json(queries::get_alerts(&state.store, &params))
}

pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<RiskAlert> {
    state
        .store
        .resolve_alert(&id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Alert {} not found", id)))
}

// ============================================================
// Subscriptions
// ============================================================

/// Server-sent event stream for one topic. Each event is named after the
/// topic and carries the entity as JSON.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let topic: Topic = topic
        .parse()
        .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
    let subscription = state.hub.subscribe(topic);
    tracing::info!(topic = topic.as_str(), subscriber = subscription.id(), "SSE client connected");

    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        let sse = match event.payload_json() {
            Ok(data) => Event::default().event(event.topic().as_str()).data(data),
            Err(e) => {
                tracing::warn!(topic = event.topic().as_str(), error = %e, "Failed to encode event");
                Event::default().event("error").data(e.to_string())
            }
        };
        Some((Ok(sse), subscription))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
