//! Route tables.
//!
//! ```text
//! GET  /ping                  liveness, always 200
//! GET  /health                database and provider health, always 200
//! GET  /telegram_status       provider session status, 200 ready / 500 not
//!
//! POST /ejecutar_emergencia   fire a user's alerts now
//! POST /ejecutar              text and call one destination directly
//! ```

pub mod emergency;
pub mod health;
