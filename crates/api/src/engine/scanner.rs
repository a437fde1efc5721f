//! Scan cycles over the alert store.
//!
//! One cycle:
//! 1. `claim_due(now)` moves overdue armed alerts to firing.
//! 2. `claim_manual()` collects everything firing, which includes step 1's
//!    rows, manual triggers, and alerts a crashed cycle left behind.
//! 3. The union, deduplicated by id in store order, is processed one alert
//!    at a time: contacts, dispatch handoff, finalize.
//!
//! Alerts are finalized as soon as their job is handed off; delivery is
//! best-effort and never re-fires an alert. An alert whose contacts cannot
//! be read, or whose job the dispatcher refuses, stays firing and is
//! retried by the next cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use centinela_core::alert::Alert;
use centinela_core::policy::{DispatchJob, NotificationPolicy};
use centinela_core::store::{AlertStore, ContactDirectory};
use centinela_core::types::{now_millis, DbId, UserId};
use centinela_notify::{DispatchError, DispatcherHandle, JobReport};
use serde::Serialize;
use tokio::sync::Mutex;

/// How a cycle hands jobs to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Enqueue and move on (background scans).
    FireAndForget,
    /// Enqueue and wait, bounded, for the job report (manual triggers).
    AwaitReport,
}

/// Counters for one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Alerts picked up by this cycle.
    pub claimed: usize,
    /// Jobs handed to the dispatcher.
    pub dispatched: usize,
    /// Alerts finalized without dispatch because the user has no contacts.
    pub skipped_no_contacts: usize,
    /// Further alerts of a user already notified in this cycle.
    pub duplicates: usize,
    /// Alerts left firing for the next cycle: contacts unreadable, or the
    /// dispatcher refused the job.
    pub deferred: usize,
    /// Jobs the dispatcher would not accept.
    pub dispatch_failures: usize,
    pub finalize_failures: usize,
    /// Failed claim queries.
    pub store_errors: usize,
    /// Reports of awaited jobs, in processing order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<JobReport>,
}

impl ScanReport {
    pub fn is_idle(&self) -> bool {
        self.claimed == 0 && self.store_errors == 0
    }
}

pub struct AlertEngine {
    store: Arc<dyn AlertStore>,
    contacts: Arc<dyn ContactDirectory>,
    dispatcher: DispatcherHandle,
    policy: NotificationPolicy,
    dispatch_wait: Duration,
    /// Held for the duration of a cycle.
    cycle: Mutex<()>,
}

impl AlertEngine {
    pub fn new(
        store: Arc<dyn AlertStore>,
        contacts: Arc<dyn ContactDirectory>,
        dispatcher: DispatcherHandle,
        policy: NotificationPolicy,
        dispatch_wait: Duration,
    ) -> Self {
        Self {
            store,
            contacts,
            dispatcher,
            policy,
            dispatch_wait,
            cycle: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &dyn AlertStore {
        self.store.as_ref()
    }

    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    /// Scheduled entry point: run a fire-and-forget cycle unless one is
    /// already in progress, in which case this tick is skipped.
    pub async fn tick(&self) -> Option<ScanReport> {
        let _guard = self.cycle.try_lock().ok()?;
        Some(self.scan(Handoff::FireAndForget).await)
    }

    /// Run one cycle, waiting for any in-progress cycle to finish first.
    pub async fn run_cycle(&self, handoff: Handoff) -> ScanReport {
        let _guard = self.cycle.lock().await;
        self.scan(handoff).await
    }

    async fn scan(&self, handoff: Handoff) -> ScanReport {
        let mut report = ScanReport::default();
        let now = now_millis();

        let mut batch = match self.store.claim_due(now).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim due alerts");
                report.store_errors += 1;
                Vec::new()
            }
        };

        match self.store.claim_manual().await {
            Ok(firing) => batch.extend(firing),
            Err(e) => {
                tracing::error!(error = %e, "Failed to list firing alerts");
                report.store_errors += 1;
            }
        }

        let mut seen: HashSet<DbId> = HashSet::with_capacity(batch.len());
        batch.retain(|alert| seen.insert(alert.id));
        report.claimed = batch.len();

        let mut notified: HashSet<UserId> = HashSet::new();
        for alert in &batch {
            self.process(alert, handoff, &mut notified, &mut report).await;
        }

        if !report.is_idle() {
            tracing::info!(
                claimed = report.claimed,
                dispatched = report.dispatched,
                skipped_no_contacts = report.skipped_no_contacts,
                duplicates = report.duplicates,
                deferred = report.deferred,
                dispatch_failures = report.dispatch_failures,
                finalize_failures = report.finalize_failures,
                store_errors = report.store_errors,
                "Scan cycle finished",
            );
        }
        report
    }

    async fn process(
        &self,
        alert: &Alert,
        handoff: Handoff,
        notified: &mut HashSet<UserId>,
        report: &mut ScanReport,
    ) {
        if notified.contains(&alert.user_id) {
            tracing::info!(
                alert_id = alert.id,
                user_id = %alert.user_id,
                "User already notified this cycle, finalizing without dispatch",
            );
            report.duplicates += 1;
            self.finalize(alert.id, report).await;
            return;
        }

        let contacts = match self.contacts.lookup(&alert.user_id).await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::error!(
                    alert_id = alert.id,
                    user_id = %alert.user_id,
                    error = %e,
                    "Contact lookup failed, alert left firing for the next cycle",
                );
                report.deferred += 1;
                return;
            }
        };

        match self.policy.build_job(alert, &contacts) {
            None => {
                tracing::warn!(
                    alert_id = alert.id,
                    user_id = %alert.user_id,
                    "No contacts to notify",
                );
                report.skipped_no_contacts += 1;
            }
            Some(job) => {
                tracing::info!(
                    alert_id = alert.id,
                    user_id = %alert.user_id,
                    destinations = job.destinations.len(),
                    calls = job.call_count(),
                    "Dispatching emergency notifications",
                );
                if !self.hand_off(alert.id, job, handoff, report).await {
                    report.deferred += 1;
                    return;
                }
            }
        }

        notified.insert(alert.user_id.clone());
        self.finalize(alert.id, report).await;
    }

    /// Returns whether the dispatcher accepted the job.
    async fn hand_off(
        &self,
        alert_id: DbId,
        job: DispatchJob,
        handoff: Handoff,
        report: &mut ScanReport,
    ) -> bool {
        let result = match handoff {
            Handoff::FireAndForget => self.dispatcher.submit(job).await,
            Handoff::AwaitReport => {
                match self.dispatcher.submit_and_wait(job, self.dispatch_wait).await {
                    Ok(job_report) => {
                        report.jobs.push(job_report);
                        Ok(())
                    }
                    Err(DispatchError::TimedOut(wait)) => {
                        tracing::warn!(
                            alert_id,
                            wait_secs = wait.as_secs(),
                            "Dispatch still running, no longer waiting",
                        );
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match result {
            Ok(()) => {
                report.dispatched += 1;
                true
            }
            Err(e) => {
                tracing::error!(
                    alert_id,
                    error = %e,
                    "Dispatch handoff failed, alert left firing for the next cycle",
                );
                report.dispatch_failures += 1;
                false
            }
        }
    }

    async fn finalize(&self, alert_id: DbId, report: &mut ScanReport) {
        if let Err(e) = self.store.finalize(alert_id).await {
            tracing::error!(alert_id, error = %e, "Failed to finalize alert");
            report.finalize_failures += 1;
        }
    }
}
