//! [`PgStore`]: the Postgres implementation of the engine's store traits.

use async_trait::async_trait;
use centinela_core::alert::Alert;
use centinela_core::contact::Contact;
use centinela_core::store::{AlertStore, ContactDirectory, StoreError};
use centinela_core::types::{DbId, EpochMillis};

use crate::models::alert::AlertRow;
use crate::repositories::{AlertRepo, ContactRepo};
use crate::DbPool;

/// Store adapter over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}

fn into_alerts(rows: Vec<AlertRow>) -> Result<Vec<Alert>, StoreError> {
    rows.into_iter()
        .map(|row| {
            let id = row.id;
            Alert::try_from(row).map_err(|e| StoreError::Malformed(format!("alert {id}: {e}")))
        })
        .collect()
}

#[async_trait]
impl AlertStore for PgStore {
    async fn claim_due(&self, now: EpochMillis) -> Result<Vec<Alert>, StoreError> {
        let rows = AlertRepo::claim_due(&self.pool, now).await.map_err(backend)?;
        into_alerts(rows)
    }

    async fn claim_manual(&self) -> Result<Vec<Alert>, StoreError> {
        let rows = AlertRepo::list_firing(&self.pool).await.map_err(backend)?;
        into_alerts(rows)
    }

    async fn finalize(&self, alert_id: DbId) -> Result<(), StoreError> {
        let found = AlertRepo::finalize(&self.pool, alert_id)
            .await
            .map_err(backend)?;
        if !found {
            tracing::warn!(alert_id, "Finalize matched no alert row");
        }
        Ok(())
    }

    async fn mark_firing(&self, user_id: &str) -> Result<u64, StoreError> {
        AlertRepo::mark_firing_for_user(&self.pool, user_id)
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl ContactDirectory for PgStore {
    async fn lookup(&self, user_id: &str) -> Result<Vec<Contact>, StoreError> {
        let rows = ContactRepo::list_for_user(&self.pool, user_id)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Contact::from).collect())
    }
}
