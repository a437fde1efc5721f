//! Store seams used by the scan engine.
//!
//! The external store is the source of truth for alert state. The engine is
//! written against these traits so it can run over Postgres in production
//! and over an in-memory table in tests.

use async_trait::async_trait;

use crate::alert::Alert;
use crate::contact::Contact;
use crate::types::{DbId, EpochMillis};

/// Failure talking to the external store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Malformed row: {0}")]
    Malformed(String),
}

/// Reads and writes the `estado` field of alert records.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Atomically move every `Armed` alert with `deadline < now` to
    /// `Firing`, returning the rows this call transitioned.
    ///
    /// Two concurrent callers never both receive the same row.
    async fn claim_due(&self, now: EpochMillis) -> Result<Vec<Alert>, StoreError>;

    /// Every alert currently `Firing`, in store order.
    async fn claim_manual(&self) -> Result<Vec<Alert>, StoreError>;

    /// Unconditionally move the alert to `Idle`. Idempotent.
    async fn finalize(&self, alert_id: DbId) -> Result<(), StoreError>;

    /// Write `Firing` onto every alert owned by `user_id`, returning the
    /// number of rows written.
    async fn mark_firing(&self, user_id: &str) -> Result<u64, StoreError>;
}

/// Resolves a user to their emergency contacts.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// An empty result is a valid answer, not an error.
    async fn lookup(&self, user_id: &str) -> Result<Vec<Contact>, StoreError>;
}
