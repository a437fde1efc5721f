//! Manual "fire now" trigger.
//!
//! Writes `Firing` onto the user's alerts and runs one scan cycle right
//! away, awaiting dispatch reports so the caller sees the outcome without
//! waiting for the next tick. Once the state write succeeds the trigger
//! reports success, whatever happens to delivery.
//!
//! The cycle runs on its own task. Dropping the trigger future (a client
//! disconnect, a request timeout) stops the wait, never the cycle, so a
//! handed-off alert is always finalized.

use std::sync::Arc;

use centinela_core::store::StoreError;
use serde::Serialize;
use tokio::task::JoinError;

use super::scanner::{AlertEngine, Handoff, ScanReport};

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("user_id is required")]
    MissingUserId,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Scan cycle task failed: {0}")]
    Cycle(#[from] JoinError),
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub user_id: String,
    /// Alert rows switched to firing by this trigger.
    pub alerts_marked: u64,
    pub scan: ScanReport,
}

impl AlertEngine {
    /// Fire the alerts of `user_id` now.
    pub async fn trigger(
        self: &Arc<Self>,
        user_id: Option<&str>,
    ) -> Result<TriggerOutcome, TriggerError> {
        let user_id = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(TriggerError::MissingUserId)?;

        let alerts_marked = self.store().mark_firing(user_id).await?;
        tracing::info!(user_id, alerts_marked, "Manual emergency trigger");

        let engine = Arc::clone(self);
        let cycle = tokio::spawn(async move { engine.run_cycle(Handoff::AwaitReport).await });
        let scan = cycle.await?;

        Ok(TriggerOutcome {
            user_id: user_id.to_string(),
            alerts_marked,
            scan,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use centinela_core::alert::AlertState;
    use centinela_notify::recording::{Operation, Step};

    use super::*;
    use crate::engine::testing::{Harness, MemoryStore};

    #[tokio::test]
    async fn missing_or_blank_user_id_is_rejected() {
        let harness = Harness::new(MemoryStore::new());

        assert_matches!(
            harness.engine.trigger(None).await,
            Err(TriggerError::MissingUserId)
        );
        assert_matches!(
            harness.engine.trigger(Some("  ")).await,
            Err(TriggerError::MissingUserId)
        );
    }

    #[tokio::test]
    async fn trigger_fires_an_armed_alert_immediately() {
        let store = MemoryStore::new();
        let id = store.add_alert("u1", AlertState::Armed, i64::MAX);
        store.add_contact("u1", "+1", true);
        let harness = Harness::new(store);

        let outcome = harness.engine.trigger(Some("u1")).await.unwrap();

        assert_eq!(outcome.alerts_marked, 1);
        assert_eq!(outcome.scan.dispatched, 1);
        assert_eq!(outcome.scan.jobs.len(), 1);
        assert_eq!(
            harness.store.transitions(id),
            [AlertState::Firing, AlertState::Idle]
        );
        assert_eq!(harness.provider.trace(), ["text(+1)", "call(+1)"]);
    }

    #[tokio::test]
    async fn trigger_without_alert_rows_succeeds_without_dispatch() {
        let store = MemoryStore::new();
        store.add_contact("u2", "+2", true);
        let harness = Harness::new(store);

        let outcome = harness.engine.trigger(Some("u2")).await.unwrap();

        assert_eq!(outcome.alerts_marked, 0);
        assert_eq!(outcome.scan.dispatched, 0);
        assert!(harness.provider.attempts().is_empty());
    }

    #[tokio::test]
    async fn trigger_without_contacts_still_succeeds() {
        let store = MemoryStore::new();
        let id = store.add_alert("u3", AlertState::Idle, 0);
        let harness = Harness::new(store);

        let outcome = harness.engine.trigger(Some("u3")).await.unwrap();

        assert_eq!(outcome.scan.skipped_no_contacts, 1);
        assert_eq!(harness.store.state(id), AlertState::Idle);
    }

    #[tokio::test]
    async fn numeric_looking_ids_are_passed_through_trimmed() {
        let store = MemoryStore::new();
        store.add_alert("42", AlertState::Armed, i64::MAX);
        let harness = Harness::new(store);

        let outcome = harness.engine.trigger(Some(" 42 ")).await.unwrap();

        assert_eq!(outcome.user_id, "42");
        assert_eq!(outcome.alerts_marked, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trigger_still_finalizes_and_never_refires() {
        let store = MemoryStore::new();
        let id = store.add_alert("u1", AlertState::Armed, i64::MAX);
        store.add_contact("u1", "+1", true);
        let harness = Harness::new(store);
        harness
            .provider
            .script(Operation::Text, "+1", Step::RateLimit(3));

        // Give up on the reply while the text is cooling down.
        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), harness.engine.trigger(Some("u1"))).await;
        assert!(abandoned.is_err());

        // Waits for the detached cycle, then finds nothing left to fire.
        let next = harness.engine.run_cycle(Handoff::FireAndForget).await;

        assert_eq!(next.claimed, 0);
        assert_eq!(next.dispatched, 0);
        assert_eq!(
            harness.store.transitions(id),
            [AlertState::Firing, AlertState::Idle]
        );
        let provider = harness.shutdown().await;
        assert_eq!(provider.trace(), ["text(+1)", "text(+1)", "call(+1)"]);
    }
}
