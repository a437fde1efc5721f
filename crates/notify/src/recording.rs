//! In-process provider that records operations instead of sending them.
//!
//! Backs `PROVIDER_DRY_RUN=true` and the test suites. Failures can be
//! scripted per operation and destination; each scripted step is consumed
//! by one attempt, after which attempts succeed.
//!
//! Recorded attempts and resolved peers are bounded: past the history
//! limit the oldest entries are dropped, so a long dry run stays flat.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::protocol::CallRequest;
use crate::provider::{PeerHandle, Provider, ProviderError, ProviderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Text,
    Resolve,
    Call,
}

/// One recorded attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub operation: Operation,
    pub destination: String,
    pub succeeded: bool,
}

/// A scripted result for the next attempt of an operation.
#[derive(Debug, Clone)]
pub enum Step {
    Fail(String),
    RateLimit(u64),
}

/// Attempts and peers retained by [`RecordingProvider::new`].
pub const DEFAULT_HISTORY: usize = 1024;

#[derive(Default)]
struct Inner {
    status: ProviderStatus,
    attempts: VecDeque<Attempt>,
    script: HashMap<(Operation, String), VecDeque<Step>>,
    peers: VecDeque<(i64, String)>,
    next_peer: i64,
}

pub struct RecordingProvider {
    inner: Mutex<Inner>,
    history: usize,
}

impl RecordingProvider {
    /// A connected, authorized provider with no scripted failures.
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Like [`RecordingProvider::new`], keeping at most `limit` attempts and
    /// `limit` resolved peers.
    pub fn with_history(limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: ProviderStatus::READY,
                ..Inner::default()
            }),
            history: limit.max(1),
        }
    }

    pub fn set_status(&self, status: ProviderStatus) {
        self.lock().status = status;
    }

    /// Queue a scripted result for the next unscripted attempt of
    /// `operation` against `destination`.
    pub fn script(&self, operation: Operation, destination: &str, step: Step) {
        self.lock()
            .script
            .entry((operation, destination.to_string()))
            .or_default()
            .push_back(step);
    }

    /// Retained attempts, oldest first.
    pub fn attempts(&self) -> Vec<Attempt> {
        self.lock().attempts.iter().cloned().collect()
    }

    /// Attempts as `"text(+1)"`-style labels, resolves excluded.
    pub fn trace(&self) -> Vec<String> {
        self.lock()
            .attempts
            .iter()
            .filter_map(|a| match a.operation {
                Operation::Text => Some(format!("text({})", a.destination)),
                Operation::Call => Some(format!("call({})", a.destination)),
                Operation::Resolve => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-record.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn attempt(&self, operation: Operation, destination: &str) -> Result<(), ProviderError> {
        let mut inner = self.lock();
        let step = inner
            .script
            .get_mut(&(operation, destination.to_string()))
            .and_then(VecDeque::pop_front);

        let result = match step {
            None => Ok(()),
            Some(Step::Fail(reason)) => Err(ProviderError::Other(reason)),
            Some(Step::RateLimit(seconds)) => Err(ProviderError::RateLimited { seconds }),
        };

        inner.attempts.push_back(Attempt {
            operation,
            destination: destination.to_string(),
            succeeded: result.is_ok(),
        });
        if inner.attempts.len() > self.history {
            inner.attempts.pop_front();
        }
        result
    }
}

impl Default for RecordingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    async fn status(&self) -> ProviderStatus {
        self.lock().status
    }

    async fn send_text(&self, destination: &str, body: &str) -> Result<(), ProviderError> {
        self.attempt(Operation::Text, destination)?;
        tracing::info!(destination, chars = body.chars().count(), "Dry run: text");
        Ok(())
    }

    async fn resolve(&self, destination: &str) -> Result<PeerHandle, ProviderError> {
        self.attempt(Operation::Resolve, destination)?;
        let mut inner = self.lock();
        let id = match inner.peers.iter().find(|(_, d)| d.as_str() == destination) {
            Some((id, _)) => *id,
            None => {
                inner.next_peer += 1;
                let id = inner.next_peer;
                inner.peers.push_back((id, destination.to_string()));
                if inner.peers.len() > self.history {
                    inner.peers.pop_front();
                }
                id
            }
        };
        Ok(PeerHandle { id, access_hash: 0 })
    }

    async fn request_call(
        &self,
        peer: &PeerHandle,
        request: &CallRequest,
    ) -> Result<(), ProviderError> {
        let destination = self
            .lock()
            .peers
            .iter()
            .find(|(id, _)| *id == peer.id)
            .map(|(_, destination)| destination.clone())
            .ok_or_else(|| ProviderError::Other(format!("unknown peer {}", peer.id)))?;
        self.attempt(Operation::Call, &destination)?;
        tracing::info!(destination, random_id = request.random_id, "Dry run: call");
        Ok(())
    }
}
