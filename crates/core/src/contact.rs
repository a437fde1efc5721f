use serde::Serialize;

use crate::types::UserId;

/// One emergency contact belonging to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub user_id: UserId,
    /// Destination in the provider's addressing scheme (phone or handle).
    pub phone: String,
    pub is_primary: bool,
}
