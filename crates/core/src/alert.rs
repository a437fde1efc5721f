//! Alert records and their lifecycle states.
//!
//! ```text
//!   Armed ──deadline passed──▶ Firing ──job handed off──▶ Idle
//!     ▲                          ▲
//!     │                          └── manual trigger (from any state)
//!     └── re-armed by the control surface
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{DbId, EpochMillis, UserId};

/// Lifecycle state of an alert, stored in `alertas.estado`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// Counting down to its deadline.
    Armed,
    /// Claimed for notification dispatch.
    Firing,
    /// Terminal until the control surface re-arms it.
    Idle,
}

impl AlertState {
    /// The literal persisted in the store.
    pub fn as_str(self) -> &'static str {
        match self {
            AlertState::Armed => "activo",
            AlertState::Firing => "disparado",
            AlertState::Idle => "inactivo",
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activo" => Ok(AlertState::Armed),
            "disparado" => Ok(AlertState::Firing),
            "inactivo" => Ok(AlertState::Idle),
            other => Err(CoreError::Validation(format!(
                "unknown alert state '{other}'"
            ))),
        }
    }
}

/// One armed dead-man's-switch instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub id: DbId,
    pub user_id: UserId,
    pub state: AlertState,
    /// Epoch milliseconds after which an `Armed` alert is overdue.
    pub deadline: EpochMillis,
    /// User-supplied notification body, if any.
    pub message: Option<String>,
}

impl Alert {
    /// Whether the alert should be claimed by a scan at `now`.
    ///
    /// Only `Armed` alerts expire; the deadline itself is not yet overdue.
    pub fn is_due(&self, now: EpochMillis) -> bool {
        self.state == AlertState::Armed && self.deadline < now
    }

    /// The user-supplied message, ignoring blank strings.
    pub fn custom_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn alert(state: AlertState, deadline: EpochMillis) -> Alert {
        Alert {
            id: 1,
            user_id: "u1".to_string(),
            state,
            deadline,
            message: None,
        }
    }

    #[test]
    fn state_literals_parse_back() {
        for state in [AlertState::Armed, AlertState::Firing, AlertState::Idle] {
            assert_eq!(state.as_str().parse::<AlertState>().unwrap(), state);
        }
    }

    #[test]
    fn unknown_state_is_rejected() {
        assert_matches!("armed".parse::<AlertState>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn armed_alert_is_due_strictly_after_deadline() {
        let a = alert(AlertState::Armed, 1_000);
        assert!(!a.is_due(999));
        assert!(!a.is_due(1_000));
        assert!(a.is_due(1_001));
    }

    #[test]
    fn only_armed_alerts_expire() {
        assert!(!alert(AlertState::Firing, 0).is_due(10));
        assert!(!alert(AlertState::Idle, 0).is_due(10));
    }

    #[test]
    fn blank_custom_message_is_ignored() {
        let mut a = alert(AlertState::Armed, 0);
        a.message = Some("   ".to_string());
        assert_eq!(a.custom_message(), None);

        a.message = Some(" ayuda ".to_string());
        assert_eq!(a.custom_message(), Some("ayuda"));
    }
}
