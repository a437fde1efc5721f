//! Row model for the `alertas` table.

use centinela_core::alert::{Alert, AlertState};
use centinela_core::error::CoreError;
use centinela_core::types::{DbId, EpochMillis, UserId};
use sqlx::FromRow;

/// A row from the `alertas` table, with the store's column names.
#[derive(Debug, Clone, FromRow)]
pub struct AlertRow {
    pub id: DbId,
    pub user_id: UserId,
    pub estado: String,
    pub tiempo_fin: EpochMillis,
    pub mensaje_personalizado: Option<String>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = CoreError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let state: AlertState = row.estado.parse()?;
        Ok(Alert {
            id: row.id,
            user_id: row.user_id,
            state,
            deadline: row.tiempo_fin,
            message: row.mensaje_personalizado,
        })
    }
}
