//! Repository for the `alertas` table.
//!
//! Every state literal comes from [`AlertState::as_str`]; no raw strings.

use centinela_core::alert::AlertState;
use centinela_core::types::{DbId, EpochMillis};
use sqlx::PgPool;

use crate::models::alert::AlertRow;

/// Column list for `alertas` queries.
const COLUMNS: &str = "id, user_id, estado, tiempo_fin, mensaje_personalizado";

/// State transitions on alert records.
pub struct AlertRepo;

impl AlertRepo {
    /// Atomically move overdue armed alerts to firing.
    ///
    /// A single conditional `UPDATE` both selects and transitions the rows,
    /// so concurrent callers racing on the same row serialize on its lock
    /// and only the first one sees it still armed.
    pub async fn claim_due(pool: &PgPool, now: EpochMillis) -> Result<Vec<AlertRow>, sqlx::Error> {
        let query = format!(
            "WITH claimed AS ( \
                 UPDATE alertas SET estado = $1 \
                 WHERE estado = $2 AND tiempo_fin < $3 \
                 RETURNING {COLUMNS} \
             ) \
             SELECT {COLUMNS} FROM claimed ORDER BY id"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(AlertState::Firing.as_str())
            .bind(AlertState::Armed.as_str())
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// List every alert currently firing, oldest first.
    pub async fn list_firing(pool: &PgPool) -> Result<Vec<AlertRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alertas WHERE estado = $1 ORDER BY id");
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(AlertState::Firing.as_str())
            .fetch_all(pool)
            .await
    }

    /// Move an alert to idle regardless of its current state.
    ///
    /// Returns `true` if a row with that id exists.
    pub async fn finalize(pool: &PgPool, alert_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE alertas SET estado = $2 WHERE id = $1")
            .bind(alert_id)
            .bind(AlertState::Idle.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every alert owned by `user_id` as firing (manual trigger).
    pub async fn mark_firing_for_user(pool: &PgPool, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE alertas SET estado = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(AlertState::Firing.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_id(pool: &PgPool, alert_id: DbId) -> Result<Option<AlertRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alertas WHERE id = $1");
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(alert_id)
            .fetch_optional(pool)
            .await
    }
}
