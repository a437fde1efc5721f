//! Alert scan and transition engine.
//!
//! [`AlertEngine`] runs scan cycles: claim overdue alerts, pick up alerts
//! already firing, resolve contacts, hand dispatch jobs to the notification
//! dispatcher and finalize each alert to idle. Cycles never overlap.
//! [`trigger`] is the manual "fire now" path.

pub mod scanner;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use scanner::{AlertEngine, Handoff, ScanReport};
pub use trigger::{TriggerError, TriggerOutcome};
