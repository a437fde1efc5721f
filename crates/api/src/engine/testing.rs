//! In-memory store and engine harness for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use centinela_core::alert::{Alert, AlertState};
use centinela_core::contact::Contact;
use centinela_core::policy::NotificationPolicy;
use centinela_core::store::{AlertStore, ContactDirectory, StoreError};
use centinela_core::types::{DbId, EpochMillis};
use centinela_notify::{Dispatcher, DispatcherConfig, RecordingProvider};
use tokio::task::JoinHandle;

use super::AlertEngine;

#[derive(Default)]
struct Tables {
    alerts: Vec<Alert>,
    contacts: Vec<Contact>,
    history: HashMap<DbId, Vec<AlertState>>,
    failing_lookups: HashSet<String>,
    fail_claim_due: bool,
    fail_finalize: bool,
}

impl Tables {
    fn set_state(&mut self, index: usize, state: AlertState) {
        let alert = &mut self.alerts[index];
        alert.state = state;
        self.history.entry(alert.id).or_default().push(state);
    }
}

/// Alert and contact tables behind one mutex, so every operation is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn injected(what: &str) -> StoreError {
    StoreError::Backend(Box::new(std::io::Error::other(format!("injected {what} failure"))))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn add_alert(&self, user_id: &str, state: AlertState, deadline: EpochMillis) -> DbId {
        let mut tables = self.lock();
        let id = tables.alerts.len() as DbId + 1;
        tables.alerts.push(Alert {
            id,
            user_id: user_id.to_string(),
            state,
            deadline,
            message: None,
        });
        id
    }

    pub fn add_contact(&self, user_id: &str, phone: &str, is_primary: bool) {
        self.lock().contacts.push(Contact {
            user_id: user_id.to_string(),
            phone: phone.to_string(),
            is_primary,
        });
    }

    pub fn state(&self, id: DbId) -> AlertState {
        self.lock()
            .alerts
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.state)
            .unwrap()
    }

    /// Every state written to the alert since it was added.
    pub fn transitions(&self, id: DbId) -> Vec<AlertState> {
        self.lock().history.get(&id).cloned().unwrap_or_default()
    }

    pub fn fail_lookup_for(&self, user_id: &str) {
        self.lock().failing_lookups.insert(user_id.to_string());
    }

    pub fn heal_lookups(&self) {
        self.lock().failing_lookups.clear();
    }

    pub fn fail_claim_due(&self) {
        self.lock().fail_claim_due = true;
    }

    pub fn fail_finalize(&self) {
        self.lock().fail_finalize = true;
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn claim_due(&self, now: EpochMillis) -> Result<Vec<Alert>, StoreError> {
        let mut tables = self.lock();
        if tables.fail_claim_due {
            return Err(injected("claim_due"));
        }
        let due: Vec<usize> = (0..tables.alerts.len())
            .filter(|&i| tables.alerts[i].is_due(now))
            .collect();
        for &i in &due {
            tables.set_state(i, AlertState::Firing);
        }
        Ok(due.into_iter().map(|i| tables.alerts[i].clone()).collect())
    }

    async fn claim_manual(&self) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .lock()
            .alerts
            .iter()
            .filter(|a| a.state == AlertState::Firing)
            .cloned()
            .collect())
    }

    async fn finalize(&self, alert_id: DbId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.fail_finalize {
            return Err(injected("finalize"));
        }
        if let Some(i) = tables.alerts.iter().position(|a| a.id == alert_id) {
            tables.set_state(i, AlertState::Idle);
        }
        Ok(())
    }

    async fn mark_firing(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        let owned: Vec<usize> = (0..tables.alerts.len())
            .filter(|&i| tables.alerts[i].user_id == user_id)
            .collect();
        for &i in &owned {
            tables.set_state(i, AlertState::Firing);
        }
        Ok(owned.len() as u64)
    }
}

#[async_trait]
impl ContactDirectory for MemoryStore {
    async fn lookup(&self, user_id: &str) -> Result<Vec<Contact>, StoreError> {
        let tables = self.lock();
        if tables.failing_lookups.contains(user_id) {
            return Err(injected("lookup"));
        }
        Ok(tables
            .contacts
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// An engine over a [`MemoryStore`] with a running dispatcher backed by a
/// [`RecordingProvider`].
pub struct Harness {
    pub engine: Arc<AlertEngine>,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<RecordingProvider>,
    pub dispatcher_task: JoinHandle<()>,
}

impl Harness {
    pub fn new(store: MemoryStore) -> Self {
        Self::with_policy(store, NotificationPolicy::default())
    }

    pub fn with_policy(store: MemoryStore, policy: NotificationPolicy) -> Self {
        let store = Arc::new(store);
        let provider = Arc::new(RecordingProvider::new());
        let (dispatcher, handle) = Dispatcher::new(
            provider.clone(),
            DispatcherConfig {
                call_pause: Duration::ZERO,
                ..DispatcherConfig::default()
            },
        );
        let dispatcher_task = tokio::spawn(dispatcher.run());
        let engine = Arc::new(AlertEngine::new(
            store.clone(),
            store.clone(),
            handle,
            policy,
            Duration::from_secs(5),
        ));
        Self {
            engine,
            store,
            provider,
            dispatcher_task,
        }
    }

    /// Drop the engine and wait for the dispatcher to drain its queue.
    pub async fn shutdown(self) -> Arc<RecordingProvider> {
        drop(self.engine);
        self.dispatcher_task.await.unwrap();
        self.provider
    }
}
