//! Row model for the `contactos` table.

use centinela_core::contact::Contact;
use centinela_core::types::UserId;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ContactRow {
    pub user_id: UserId,
    pub telefono: String,
    pub es_primario: bool,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            user_id: row.user_id,
            phone: row.telefono,
            is_primary: row.es_primario,
        }
    }
}
