//! Notification dispatcher.
//!
//! [`Dispatcher`] is a single long-lived task that owns the provider
//! session and executes jobs strictly one at a time, in submission order.
//! Producers hold a cloneable [`DispatcherHandle`] and enqueue jobs on a
//! bounded channel, either fire-and-forget ([`DispatcherHandle::submit`])
//! or awaiting the report with a bounded wait
//! ([`DispatcherHandle::submit_and_wait`]).
//!
//! Per job, all texts are sent before any call is placed, both in
//! destination order. Failures are recorded per destination and never abort
//! the remaining destinations.

use std::sync::Arc;
use std::time::Duration;

use centinela_core::policy::DispatchJob;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::CallRequest;
use crate::provider::{Provider, ProviderError, ProviderStatus};
use crate::report::{DeliveryOutcome, DestinationReport, JobOutcome, JobReport};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Jobs that may wait in the queue before producers back off.
    pub queue_capacity: usize,
    /// Pause after each placed call before the next one.
    pub call_pause: Duration,
    /// How long a producer waits for queue space before giving up.
    pub enqueue_timeout: Duration,
    /// Cooldowns longer than this are not slept through; the destination is
    /// recorded as rate limited instead.
    pub max_cooldown: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            call_pause: Duration::from_secs(3),
            enqueue_timeout: Duration::from_secs(5),
            max_cooldown: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch queue is full")]
    QueueFull,

    #[error("Dispatcher is not running")]
    Closed,

    #[error("Timed out waiting for dispatch report after {0:?}")]
    TimedOut(Duration),
}

struct DispatchRequest {
    job: DispatchJob,
    reply: Option<oneshot::Sender<JobReport>>,
}

/// Producer side of the dispatch queue.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<DispatchRequest>,
    provider: Arc<dyn Provider>,
    enqueue_timeout: Duration,
}

impl DispatcherHandle {
    /// Enqueue a job without waiting for it to run.
    pub async fn submit(&self, job: DispatchJob) -> Result<(), DispatchError> {
        self.enqueue(DispatchRequest { job, reply: None }).await
    }

    /// Enqueue a job and wait up to `wait` for its report.
    ///
    /// On timeout the job keeps running; only the wait is abandoned.
    pub async fn submit_and_wait(
        &self,
        job: DispatchJob,
        wait: Duration,
    ) -> Result<JobReport, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(DispatchRequest {
            job,
            reply: Some(reply),
        })
        .await?;

        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(_)) => Err(DispatchError::Closed),
            Err(_) => Err(DispatchError::TimedOut(wait)),
        }
    }

    /// Provider session status, for health reporting only.
    pub async fn provider_status(&self) -> ProviderStatus {
        self.provider.status().await
    }

    async fn enqueue(&self, request: DispatchRequest) -> Result<(), DispatchError> {
        use mpsc::error::SendTimeoutError;

        self.tx
            .send_timeout(request, self.enqueue_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => DispatchError::QueueFull,
                SendTimeoutError::Closed(_) => DispatchError::Closed,
            })
    }
}

/// Consumer side: owns the provider and runs jobs one at a time.
pub struct Dispatcher {
    provider: Arc<dyn Provider>,
    rx: mpsc::Receiver<DispatchRequest>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create the dispatcher and its first handle. Spawn [`Dispatcher::run`]
    /// to start consuming.
    pub fn new(provider: Arc<dyn Provider>, config: DispatcherConfig) -> (Self, DispatcherHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let handle = DispatcherHandle {
            tx,
            provider: Arc::clone(&provider),
            enqueue_timeout: config.enqueue_timeout,
        };
        (
            Self {
                provider,
                rx,
                config,
            },
            handle,
        )
    }

    /// Run until every handle has been dropped and the queue is drained.
    pub async fn run(mut self) {
        tracing::info!(
            queue_capacity = self.config.queue_capacity,
            call_pause_ms = self.config.call_pause.as_millis() as u64,
            "Notification dispatcher started",
        );

        while let Some(request) = self.rx.recv().await {
            let report = execute(self.provider.as_ref(), &request.job, &self.config).await;
            if let Some(reply) = request.reply {
                // The waiter may have timed out; the report is already logged.
                let _ = reply.send(report);
            }
        }

        tracing::info!("Notification dispatcher stopped");
    }
}

/// Execute one job against `provider`: text pass, then call pass.
pub async fn execute(
    provider: &dyn Provider,
    job: &DispatchJob,
    config: &DispatcherConfig,
) -> JobReport {
    let status = provider.status().await;
    if !status.is_ready() {
        tracing::error!(
            alert_id = job.alert_id,
            connected = status.connected,
            authorized = status.authorized,
            "Provider unavailable, skipping dispatch",
        );
        return JobReport {
            alert_id: job.alert_id,
            outcome: JobOutcome::ProviderUnavailable,
            provider: status,
            texts: Vec::new(),
            calls: Vec::new(),
        };
    }

    let mut texts = Vec::with_capacity(job.destinations.len());
    for destination in &job.destinations {
        let outcome = send_text(provider, &destination.address, &job.body, config).await;
        texts.push(DestinationReport {
            destination: destination.address.clone(),
            outcome,
        });
    }

    let callees: Vec<&str> = job
        .destinations
        .iter()
        .filter(|d| d.call)
        .map(|d| d.address.as_str())
        .collect();
    let mut calls = Vec::with_capacity(callees.len());
    for (i, address) in callees.iter().enumerate() {
        let outcome = place_call(provider, address, config).await;
        let more_to_call = i + 1 < callees.len();
        if outcome.is_delivered() && more_to_call && !config.call_pause.is_zero() {
            tokio::time::sleep(config.call_pause).await;
        }
        calls.push(DestinationReport {
            destination: (*address).to_string(),
            outcome,
        });
    }

    let report = JobReport {
        alert_id: job.alert_id,
        outcome: JobOutcome::Completed,
        provider: status,
        texts,
        calls,
    };
    tracing::info!(
        alert_id = job.alert_id,
        texts_delivered = report.delivered_texts(),
        calls_placed = report.delivered_calls(),
        failures = report.failures(),
        "Dispatch job finished",
    );
    report
}

/// Send one text, retrying exactly once after a rate-limit cooldown.
async fn send_text(
    provider: &dyn Provider,
    destination: &str,
    body: &str,
    config: &DispatcherConfig,
) -> DeliveryOutcome {
    let seconds = match provider.send_text(destination, body).await {
        Ok(()) => return DeliveryOutcome::Delivered { attempts: 1 },
        Err(ProviderError::RateLimited { seconds }) => seconds,
        Err(e) => {
            tracing::warn!(destination, error = %e, "Text send failed");
            return DeliveryOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    if !cool_down(destination, seconds, config).await {
        return DeliveryOutcome::RateLimited {
            cooldown_secs: seconds,
        };
    }

    match provider.send_text(destination, body).await {
        Ok(()) => DeliveryOutcome::Delivered { attempts: 2 },
        Err(ProviderError::RateLimited { seconds }) => {
            tracing::warn!(destination, seconds, "Text still rate limited after retry");
            DeliveryOutcome::RateLimited {
                cooldown_secs: seconds,
            }
        }
        Err(e) => {
            tracing::warn!(destination, error = %e, "Text retry failed");
            DeliveryOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Resolve and ring one destination. Rate limits are waited out but the
/// call is not retried.
async fn place_call(
    provider: &dyn Provider,
    destination: &str,
    config: &DispatcherConfig,
) -> DeliveryOutcome {
    let result = match provider.resolve(destination).await {
        Ok(peer) => {
            let request = CallRequest::generate();
            provider.request_call(&peer, &request).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => DeliveryOutcome::Delivered { attempts: 1 },
        Err(ProviderError::RateLimited { seconds }) => {
            cool_down(destination, seconds, config).await;
            DeliveryOutcome::RateLimited {
                cooldown_secs: seconds,
            }
        }
        Err(e) => {
            tracing::warn!(destination, error = %e, "Call request failed");
            DeliveryOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Sleep through a provider cooldown. Returns `false` without sleeping when
/// the cooldown exceeds the configured maximum.
async fn cool_down(destination: &str, seconds: u64, config: &DispatcherConfig) -> bool {
    let cooldown = Duration::from_secs(seconds);
    if cooldown > config.max_cooldown {
        tracing::warn!(
            destination,
            seconds,
            max_secs = config.max_cooldown.as_secs(),
            "Provider cooldown too long, not waiting",
        );
        return false;
    }
    tracing::warn!(destination, seconds, "Rate limited by provider, cooling down");
    tokio::time::sleep(cooldown).await;
    true
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::time::Instant;

    use super::*;
    use crate::recording::{Operation, RecordingProvider, Step};

    fn job(addresses: &[&str]) -> DispatchJob {
        DispatchJob::to_all(addresses.iter().map(|a| a.to_string()), "help")
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            call_pause: Duration::ZERO,
            ..DispatcherConfig::default()
        }
    }

    #[tokio::test]
    async fn text_pass_precedes_call_pass_in_order() {
        let provider = RecordingProvider::new();

        let report = execute(&provider, &job(&["X", "Y"]), &config()).await;

        assert_eq!(provider.trace(), ["text(X)", "text(Y)", "call(X)", "call(Y)"]);
        assert_eq!(report.outcome, JobOutcome::Completed);
        assert_eq!(report.delivered_texts(), 2);
        assert_eq!(report.delivered_calls(), 2);
    }

    #[tokio::test]
    async fn failed_text_does_not_affect_siblings() {
        let provider = RecordingProvider::new();
        provider.script(Operation::Text, "A", Step::Fail("bad address".into()));

        let report = execute(&provider, &job(&["A", "B"]), &config()).await;

        assert_eq!(provider.trace(), ["text(A)", "text(B)", "call(A)", "call(B)"]);
        assert_matches!(report.texts[0].outcome, DeliveryOutcome::Failed { .. });
        assert!(report.texts[1].outcome.is_delivered());
        assert!(report.calls[1].outcome.is_delivered());
        assert_eq!(report.failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_text_sleeps_and_retries_once() {
        let provider = RecordingProvider::new();
        provider.script(Operation::Text, "+9", Step::RateLimit(3));
        provider.script(Operation::Text, "+9", Step::Fail("still down".into()));

        let started = Instant::now();
        let report = execute(&provider, &job(&["+9", "+8"]), &config()).await;

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(
            provider.trace(),
            ["text(+9)", "text(+9)", "text(+8)", "call(+9)", "call(+8)"]
        );
        assert_matches!(report.texts[0].outcome, DeliveryOutcome::Failed { .. });
        assert!(report.texts[1].outcome.is_delivered());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_text_recovers_on_retry() {
        let provider = RecordingProvider::new();
        provider.script(Operation::Text, "+9", Step::RateLimit(3));

        let report = execute(&provider, &job(&["+9"]), &config()).await;

        assert_eq!(
            report.texts[0].outcome,
            DeliveryOutcome::Delivered { attempts: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_call_is_not_retried() {
        let provider = RecordingProvider::new();
        provider.script(Operation::Call, "X", Step::RateLimit(4));

        let started = Instant::now();
        let report = execute(&provider, &job(&["X", "Y"]), &config()).await;

        assert!(started.elapsed() >= Duration::from_secs(4));
        assert_eq!(provider.trace(), ["text(X)", "text(Y)", "call(X)", "call(Y)"]);
        assert_eq!(
            report.calls[0].outcome,
            DeliveryOutcome::RateLimited { cooldown_secs: 4 }
        );
        assert!(report.calls[1].outcome.is_delivered());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_cooldown_is_not_slept() {
        let provider = RecordingProvider::new();
        provider.script(Operation::Text, "X", Step::RateLimit(3_600));

        let started = Instant::now();
        let report = execute(&provider, &job(&["X"]), &config()).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            report.texts[0].outcome,
            DeliveryOutcome::RateLimited { cooldown_secs: 3_600 }
        );
        assert_eq!(provider.trace(), ["text(X)", "call(X)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_paced_between_successes() {
        let provider = RecordingProvider::new();
        let config = DispatcherConfig {
            call_pause: Duration::from_secs(2),
            ..DispatcherConfig::default()
        };

        let started = Instant::now();
        execute(&provider, &job(&["X", "Y", "Z"]), &config).await;

        // Two pauses between three calls, none after the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn failed_resolve_skips_only_that_call() {
        let provider = RecordingProvider::new();
        provider.script(Operation::Resolve, "X", Step::Fail("no such user".into()));

        let report = execute(&provider, &job(&["X", "Y"]), &config()).await;

        assert_eq!(provider.trace(), ["text(X)", "text(Y)", "call(Y)"]);
        assert_matches!(report.calls[0].outcome, DeliveryOutcome::Failed { .. });
        assert!(report.calls[1].outcome.is_delivered());
    }

    #[tokio::test]
    async fn unauthorized_session_skips_the_job() {
        let provider = RecordingProvider::new();
        provider.set_status(ProviderStatus {
            connected: true,
            authorized: false,
        });

        let report = execute(&provider, &job(&["X"]), &config()).await;

        assert_eq!(report.outcome, JobOutcome::ProviderUnavailable);
        assert!(provider.attempts().is_empty());
    }

    #[tokio::test]
    async fn call_pass_only_covers_flagged_destinations() {
        let provider = RecordingProvider::new();
        let mut job = job(&["X", "Y"]);
        job.destinations[0].call = false;

        execute(&provider, &job, &config()).await;

        assert_eq!(provider.trace(), ["text(X)", "text(Y)", "call(Y)"]);
    }

    #[tokio::test]
    async fn jobs_run_in_submission_order_on_one_task() {
        let provider = Arc::new(RecordingProvider::new());
        let (dispatcher, handle) = Dispatcher::new(provider.clone(), config());
        let task = tokio::spawn(dispatcher.run());

        handle.submit(job(&["A"])).await.unwrap();
        let report = handle
            .submit_and_wait(job(&["B"]), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(report.delivered_texts(), 1);
        assert_eq!(provider.trace(), ["text(A)", "call(A)", "text(B)", "call(B)"]);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_is_bounded() {
        let provider = Arc::new(RecordingProvider::new());
        provider.script(Operation::Text, "slow", Step::RateLimit(30));
        let (dispatcher, handle) = Dispatcher::new(provider, config());
        tokio::spawn(dispatcher.run());

        let result = handle
            .submit_and_wait(job(&["slow"]), Duration::from_secs(1))
            .await;

        assert_matches!(result, Err(DispatchError::TimedOut(_)));
    }

    #[tokio::test]
    async fn submit_after_shutdown_reports_closed() {
        let provider = Arc::new(RecordingProvider::new());
        let (dispatcher, handle) = Dispatcher::new(provider, config());
        drop(dispatcher);

        assert_matches!(handle.submit(job(&["A"])).await, Err(DispatchError::Closed));
    }
}
