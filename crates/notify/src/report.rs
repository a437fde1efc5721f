//! Per-destination outcomes aggregated into a job report.
//!
//! A destination's failure is a value in the report, never an error that
//! escapes the dispatcher.

use centinela_core::types::DbId;
use serde::Serialize;

use crate::provider::ProviderStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Accepted by the provider after `attempts` tries.
    Delivered { attempts: u8 },
    /// Still rate limited after the allowed handling; moved on.
    RateLimited { cooldown_secs: u64 },
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationReport {
    pub destination: String,
    pub outcome: DeliveryOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Both passes ran; see the per-destination reports.
    Completed,
    /// The session was down or unauthorized; nothing was sent.
    ProviderUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub alert_id: Option<DbId>,
    pub outcome: JobOutcome,
    pub provider: ProviderStatus,
    pub texts: Vec<DestinationReport>,
    pub calls: Vec<DestinationReport>,
}

impl JobReport {
    pub fn delivered_texts(&self) -> usize {
        self.texts.iter().filter(|r| r.outcome.is_delivered()).count()
    }

    pub fn delivered_calls(&self) -> usize {
        self.calls.iter().filter(|r| r.outcome.is_delivered()).count()
    }

    pub fn failures(&self) -> usize {
        self.texts.len() + self.calls.len() - self.delivered_texts() - self.delivered_calls()
    }
}
