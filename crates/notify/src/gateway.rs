//! HTTP client for the provider gateway.
//!
//! The gateway holds the pre-authenticated user session and exposes the
//! handful of provider operations the dispatcher needs:
//!
//! ```text
//! GET  /status    -> { "connected": bool, "authorized": bool }
//! POST /messages  { "peer", "message" }
//! POST /resolve   { "peer" } -> { "id", "access_hash" }
//! POST /calls     { "peer": PeerHandle, "random_id", "g_a_hash", "protocol", "video" }
//! ```
//!
//! Every request carries the application id/hash and the session string.
//! `429` responses are mapped to [`ProviderError::RateLimited`] using the
//! `retry_after` body field or the `Retry-After` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::protocol::CallRequest;
use crate::provider::{PeerHandle, Provider, ProviderError, ProviderStatus};

/// HTTP request timeout for a single provider operation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Cooldown assumed when a 429 carries no usable hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Credentials and location of the provider session.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://127.0.0.1:8081`.
    pub base_url: String,
    pub api_id: i32,
    pub api_hash: String,
    /// Pre-authenticated session string.
    pub session: String,
}

/// Provider backed by the HTTP gateway.
pub struct GatewayProvider {
    client: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Debug, Deserialize)]
struct RetryAfterBody {
    retry_after: Option<u64>,
}

#[derive(Serialize)]
struct CallPayload<'a> {
    peer: &'a PeerHandle,
    #[serde(flatten)]
    request: &'a CallRequest,
}

impl GatewayProvider {
    pub fn new(config: GatewayConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("x-api-id", self.config.api_id.to_string())
            .header("x-api-hash", &self.config.api_hash)
            .bearer_auth(&self.config.session)
    }

    /// POST a JSON body and check the response status.
    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    /// Map non-2xx responses onto [`ProviderError`] variants.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_hint = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {e}>"));

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let body_hint = serde_json::from_str::<RetryAfterBody>(&body)
                    .ok()
                    .and_then(|b| b.retry_after);
                Err(ProviderError::RateLimited {
                    seconds: body_hint.or(header_hint).unwrap_or(DEFAULT_RETRY_AFTER_SECS),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::Unauthorized(body))
            }
            _ => Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl Provider for GatewayProvider {
    async fn status(&self) -> ProviderStatus {
        let response = match self.request(reqwest::Method::GET, "status").send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Provider gateway unreachable");
                return ProviderStatus::default();
            }
        };

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return ProviderStatus {
                connected: true,
                authorized: false,
            };
        }

        match Self::ensure_success(response).await {
            Ok(ok) => ok.json::<ProviderStatus>().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Malformed provider status response");
                ProviderStatus::default()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Provider status check failed");
                ProviderStatus::default()
            }
        }
    }

    async fn send_text(&self, destination: &str, body: &str) -> Result<(), ProviderError> {
        let payload = serde_json::json!({
            "peer": destination,
            "message": body,
        });
        self.post("messages", &payload).await?;
        Ok(())
    }

    async fn resolve(&self, destination: &str) -> Result<PeerHandle, ProviderError> {
        let payload = serde_json::json!({ "peer": destination });
        let response = self.post("resolve", &payload).await?;
        Ok(response.json::<PeerHandle>().await?)
    }

    async fn request_call(
        &self,
        peer: &PeerHandle,
        request: &CallRequest,
    ) -> Result<(), ProviderError> {
        self.post("calls", &CallPayload { peer, request }).await?;
        Ok(())
    }
}
