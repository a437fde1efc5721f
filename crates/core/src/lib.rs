//! Domain types for the Centinela emergency alert dispatcher.
//!
//! - [`alert`]: alert records and the `Armed -> Firing -> Idle` lifecycle.
//! - [`contact`]: emergency contacts.
//! - [`policy`]: who gets texted/called and with which message.
//! - [`store`]: the store seams the scan engine is written against.

pub mod alert;
pub mod contact;
pub mod error;
pub mod policy;
pub mod store;
pub mod types;
