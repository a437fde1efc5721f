//! Repository for the `contactos` table (read-only).

use sqlx::PgPool;

use crate::models::contact::ContactRow;

pub struct ContactRepo;

impl ContactRepo {
    /// All contacts for a user, in insertion order. Empty when none exist.
    pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<ContactRow>, sqlx::Error> {
        sqlx::query_as::<_, ContactRow>(
            "SELECT user_id, telefono, es_primario FROM contactos \
             WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
