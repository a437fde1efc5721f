//! Periodic alert scan.
//!
//! Runs [`AlertEngine::tick`] on a fixed interval. A tick that finds a
//! cycle already running (a manual trigger, or a slow previous cycle) is
//! skipped rather than queued, and missed ticks are not replayed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::engine::AlertEngine;

/// Run the scan loop until `cancel` is triggered.
pub async fn run(engine: Arc<AlertEngine>, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Alert scan job started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Alert scan job stopping");
                break;
            }
            _ = interval.tick() => {
                match engine.tick().await {
                    Some(report) if report.is_idle() => {
                        tracing::trace!("Alert scan: nothing to do");
                    }
                    Some(_) => {}
                    None => {
                        tracing::debug!("Alert scan: previous cycle still running, tick skipped");
                    }
                }
            }
        }
    }
}
