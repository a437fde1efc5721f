//! Row types for the `alertas` and `contactos` tables.

pub mod alert;
pub mod contact;
