//! Repository layer: one stateless struct per table.

pub mod alert_repo;
pub mod contact_repo;

pub use alert_repo::AlertRepo;
pub use contact_repo::ContactRepo;
