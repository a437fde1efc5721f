#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use centinela_api::config::{AppConfig, ProviderConfig};
use centinela_api::router::build_app_router;
use centinela_api::state::AppState;
use centinela_core::policy::NotificationPolicy;
use centinela_notify::{DispatcherConfig, RecordingProvider};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

/// Build a test `AppConfig` with a dry-run provider and no call pacing.
pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: Vec::new(),
        request_timeout_secs: 30,
        database_url: String::new(),
        run_migrations: false,
        provider: ProviderConfig::DryRun,
        scan_interval: Duration::from_secs(10),
        dispatch_wait: Duration::from_secs(5),
        dispatcher: DispatcherConfig {
            call_pause: Duration::ZERO,
            ..DispatcherConfig::default()
        },
        policy: NotificationPolicy::default(),
    }
}

/// Wire state over `pool` and `provider`, with the dispatcher running.
pub fn test_state(pool: PgPool, provider: Arc<RecordingProvider>) -> AppState {
    let (state, dispatcher) = AppState::new(pool, test_config(), provider);
    tokio::spawn(dispatcher.run());
    state
}

/// Build the full application router over `pool` and a recording provider.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, Arc::new(RecordingProvider::new()))
}

pub fn build_test_app_with(pool: PgPool, provider: Arc<RecordingProvider>) -> Router {
    let config = test_config();
    build_app_router(test_state(pool, provider), &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn insert_alert(pool: &PgPool, user_id: &str, estado: &str, tiempo_fin: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO alertas (user_id, estado, tiempo_fin) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(estado)
    .bind(tiempo_fin)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_contact(pool: &PgPool, user_id: &str, telefono: &str, es_primario: bool) {
    sqlx::query("INSERT INTO contactos (user_id, telefono, es_primario) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(telefono)
        .bind(es_primario)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn estado_of(pool: &PgPool, id: i64) -> String {
    sqlx::query_scalar("SELECT estado FROM alertas WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}
