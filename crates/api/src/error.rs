use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use centinela_core::store::StoreError;
use centinela_notify::DispatchError;
use serde_json::json;

use crate::engine::TriggerError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error responses
/// of the form `{"error": <message>, "code": <CODE>}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The alert store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The dispatcher did not accept or did not answer a job.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The provider session is disconnected or no longer authorized.
    #[error("Provider session is not connected or not authorized")]
    ProviderUnavailable,

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<TriggerError> for AppError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::MissingUserId => AppError::BadRequest(err.to_string()),
            TriggerError::Store(e) => AppError::Store(e),
            TriggerError::Cycle(e) => AppError::InternalError(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Store(err) => {
                tracing::error!(error = %err, "Store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Dispatch(DispatchError::QueueFull) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DISPATCH_BUSY",
                self.to_string(),
            ),
            AppError::Dispatch(err) => {
                tracing::error!(error = %err, "Dispatch error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DISPATCH_ERROR",
                    err.to_string(),
                )
            }
            AppError::ProviderUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROVIDER_UNAVAILABLE",
                self.to_string(),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
