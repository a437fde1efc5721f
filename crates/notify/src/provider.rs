//! The messaging/calling provider seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::protocol::CallRequest;

/// Connectivity of the provider session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub connected: bool,
    pub authorized: bool,
}

impl ProviderStatus {
    pub const READY: Self = Self {
        connected: true,
        authorized: true,
    };

    /// Whether jobs can be executed against the session.
    pub fn is_ready(self) -> bool {
        self.connected && self.authorized
    }
}

/// A destination resolved to something the provider can call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerHandle {
    pub id: i64,
    pub access_hash: i64,
}

/// Errors from a single provider operation.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider asked us to back off for `seconds`.
    #[error("Rate limited, retry after {seconds}s")]
    RateLimited { seconds: u64 },

    /// The session is missing, expired or revoked.
    #[error("Provider session not authorized: {0}")]
    Unauthorized(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider rejected the operation.
    #[error("Provider error ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Outbound messaging and call signaling.
///
/// Implementations wrap a single provider session, which is not safe for
/// concurrent use; only the dispatcher task calls the send operations.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Current connection and authorization state. Never fails; an
    /// unreachable provider reports as disconnected.
    async fn status(&self) -> ProviderStatus;

    async fn send_text(&self, destination: &str, body: &str) -> Result<(), ProviderError>;

    /// Resolve an address (phone or handle) to a callable peer.
    async fn resolve(&self, destination: &str) -> Result<PeerHandle, ProviderError>;

    async fn request_call(&self, peer: &PeerHandle, request: &CallRequest)
        -> Result<(), ProviderError>;
}
