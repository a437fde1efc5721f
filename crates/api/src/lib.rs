//! Centinela dispatcher service library.
//!
//! Exposes configuration, state, the alert engine, error handling and
//! routes so integration tests and the binary entrypoint share them.

pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
