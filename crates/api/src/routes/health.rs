use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use centinela_notify::ProviderStatus;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when both the database and the provider are usable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    pub provider_connected: bool,
    pub provider_authorized: bool,
}

/// GET /ping -- liveness probe.
async fn ping() -> &'static str {
    "pong"
}

/// GET /health -- returns service, database and provider health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = centinela_db::health_check(&state.pool).await.is_ok();
    let provider = state.engine.dispatcher().provider_status().await;

    let status = if db_healthy && provider.is_ready() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        provider_connected: provider.connected,
        provider_authorized: provider.authorized,
    })
}

/// GET /telegram_status -- 200 when the provider session is connected and
/// authorized, 500 otherwise.
async fn provider_status(State(state): State<AppState>) -> (StatusCode, Json<ProviderStatus>) {
    let status = state.engine.dispatcher().provider_status().await;

    let code = if status.is_ready() {
        StatusCode::OK
    } else {
        tracing::warn!(
            connected = status.connected,
            authorized = status.authorized,
            "Provider session not ready"
        );
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (code, Json(status))
}

/// Mount the probe routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/telegram_status", get(provider_status))
}
