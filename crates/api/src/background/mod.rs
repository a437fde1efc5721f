//! Long-running tasks spawned by the binary next to the HTTP server.
//!
//! They stop when their [`CancellationToken`] is cancelled.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod alert_scan;
