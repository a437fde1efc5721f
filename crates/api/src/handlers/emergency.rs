//! Handlers for the manual trigger and the direct dispatch endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use centinela_core::policy::DispatchJob;
use centinela_notify::{DispatchError, JobOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::ScanReport;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /ejecutar_emergencia`.
///
/// Clients send the id either as a string or as a number.
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub user_id: Option<Value>,
}

impl TriggerRequest {
    fn user_id(&self) -> Option<String> {
        match self.user_id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
    pub user_id: String,
    pub alerts_marked: u64,
    pub scan: ScanReport,
}

/// Request body for `POST /ejecutar`.
#[derive(Debug, Deserialize)]
pub struct DirectRequest {
    #[serde(default)]
    pub usuario_destino: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /ejecutar_emergencia
///
/// Marks the user's alerts as firing and runs a scan cycle before replying.
/// Once the state write succeeds the reply is 200 whatever delivery did.
pub async fn trigger(
    State(state): State<AppState>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> AppResult<Json<TriggerResponse>> {
    let Json(body) = payload?;
    let user_id = body.user_id();

    let outcome = state.engine.trigger(user_id.as_deref()).await?;

    Ok(Json(TriggerResponse {
        status: "ok",
        user_id: outcome.user_id,
        alerts_marked: outcome.alerts_marked,
        scan: outcome.scan,
    }))
}

/// POST /ejecutar
///
/// Texts and calls one destination through the dispatcher and returns the
/// job report. If the report does not arrive within the dispatch wait the
/// job keeps running and the reply is 202.
pub async fn dispatch_direct(
    State(state): State<AppState>,
    payload: Result<Json<DirectRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(body) = payload?;

    let (Some(destination), Some(message)) = (
        non_blank(body.usuario_destino),
        non_blank(body.mensaje),
    ) else {
        return Err(AppError::BadRequest(
            "usuario_destino and mensaje are required".into(),
        ));
    };

    tracing::info!(destination = %destination, "Direct dispatch requested");
    let job = DispatchJob::to_all([destination], message);

    match state
        .engine
        .dispatcher()
        .submit_and_wait(job, state.config.dispatch_wait)
        .await
    {
        Ok(report) if report.outcome == JobOutcome::ProviderUnavailable => {
            Err(AppError::ProviderUnavailable)
        }
        Ok(report) => Ok(Json(report).into_response()),
        Err(DispatchError::TimedOut(wait)) => {
            tracing::warn!(wait_secs = wait.as_secs(), "Direct dispatch still running");
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
