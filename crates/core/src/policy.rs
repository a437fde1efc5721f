//! Notification policy: which contacts are texted and called, and with
//! which message body.
//!
//! Texts always go to every contact. The call pass either covers every
//! contact or only the primary ones, and the body is either a fixed literal
//! or the alert's own message. Both choices are configuration.

use std::str::FromStr;

use serde::Serialize;

use crate::alert::Alert;
use crate::contact::Contact;
use crate::error::CoreError;
use crate::types::DbId;

/// Body sent when no other message applies.
pub const DEFAULT_MESSAGE: &str = "🚨 ALERTA DE EMERGENCIA: tu contacto no desactivó su \
     temporizador de seguridad o activó el botón de pánico. Intenta comunicarte de inmediato.";

/// Which contacts receive a call signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallScope {
    #[default]
    All,
    PrimaryOnly,
}

impl FromStr for CallScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(CallScope::All),
            "primary" => Ok(CallScope::PrimaryOnly),
            other => Err(CoreError::Validation(format!(
                "call scope must be 'all' or 'primary', got '{other}'"
            ))),
        }
    }
}

/// Where the notification body comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageSource {
    #[default]
    Fixed,
    /// The alert's `mensaje_personalizado`, falling back to the default.
    PerAlert,
}

impl FromStr for MessageSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(MessageSource::Fixed),
            "alert" => Ok(MessageSource::PerAlert),
            other => Err(CoreError::Validation(format!(
                "message source must be 'fixed' or 'alert', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPolicy {
    pub call_scope: CallScope,
    pub message_source: MessageSource,
    pub default_message: String,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            call_scope: CallScope::default(),
            message_source: MessageSource::default(),
            default_message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

/// One destination of a dispatch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub address: String,
    /// Whether the call pass includes this destination.
    pub call: bool,
}

/// In-memory unit of work handed to the notification dispatcher.
///
/// Never persisted: a crash mid-dispatch loses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchJob {
    /// Alert this job notifies for, when it came from a scan.
    pub alert_id: Option<DbId>,
    pub destinations: Vec<Destination>,
    pub body: String,
}

impl DispatchJob {
    /// A job that texts and calls every address.
    pub fn to_all(addresses: impl IntoIterator<Item = String>, body: impl Into<String>) -> Self {
        Self {
            alert_id: None,
            destinations: addresses
                .into_iter()
                .map(|address| Destination {
                    address,
                    call: true,
                })
                .collect(),
            body: body.into(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.destinations.iter().filter(|d| d.call).count()
    }
}

impl NotificationPolicy {
    /// The body to send for `alert`.
    pub fn message_for<'a>(&'a self, alert: &'a Alert) -> &'a str {
        match self.message_source {
            MessageSource::Fixed => &self.default_message,
            MessageSource::PerAlert => alert
                .custom_message()
                .unwrap_or(self.default_message.as_str()),
        }
    }

    /// Build the dispatch job for `alert`, or `None` when there is no one
    /// to notify.
    ///
    /// Destination order follows `contacts`; duplicate addresses are
    /// collapsed onto their first occurrence.
    pub fn build_job(&self, alert: &Alert, contacts: &[Contact]) -> Option<DispatchJob> {
        let mut destinations: Vec<Destination> = Vec::with_capacity(contacts.len());

        for contact in contacts {
            let address = contact.phone.trim();
            if address.is_empty() {
                continue;
            }
            let call = match self.call_scope {
                CallScope::All => true,
                CallScope::PrimaryOnly => contact.is_primary,
            };
            match destinations.iter_mut().find(|d| d.address == address) {
                Some(existing) => existing.call |= call,
                None => destinations.push(Destination {
                    address: address.to_string(),
                    call,
                }),
            }
        }

        if destinations.is_empty() {
            return None;
        }

        Some(DispatchJob {
            alert_id: Some(alert.id),
            destinations,
            body: self.message_for(alert).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertState;

    fn alert(message: Option<&str>) -> Alert {
        Alert {
            id: 7,
            user_id: "u1".to_string(),
            state: AlertState::Firing,
            deadline: 0,
            message: message.map(str::to_string),
        }
    }

    fn contact(phone: &str, is_primary: bool) -> Contact {
        Contact {
            user_id: "u1".to_string(),
            phone: phone.to_string(),
            is_primary,
        }
    }

    #[test]
    fn default_policy_texts_and_calls_everyone_with_fixed_message() {
        let policy = NotificationPolicy::default();
        let contacts = [contact("+1", true), contact("+2", false)];

        let job = policy.build_job(&alert(Some("custom")), &contacts).unwrap();

        assert_eq!(job.alert_id, Some(7));
        assert_eq!(job.body, DEFAULT_MESSAGE);
        let addresses: Vec<_> = job.destinations.iter().map(|d| d.address.as_str()).collect();
        assert_eq!(addresses, ["+1", "+2"]);
        assert_eq!(job.call_count(), 2);
    }

    #[test]
    fn primary_only_scope_limits_calls_but_not_texts() {
        let policy = NotificationPolicy {
            call_scope: CallScope::PrimaryOnly,
            ..NotificationPolicy::default()
        };
        let contacts = [contact("+1", false), contact("+2", true)];

        let job = policy.build_job(&alert(None), &contacts).unwrap();

        assert_eq!(job.destinations.len(), 2);
        assert!(!job.destinations[0].call);
        assert!(job.destinations[1].call);
    }

    #[test]
    fn per_alert_message_falls_back_to_default() {
        let policy = NotificationPolicy {
            message_source: MessageSource::PerAlert,
            ..NotificationPolicy::default()
        };
        let contacts = [contact("+1", true)];

        let custom = policy.build_job(&alert(Some("ven ya")), &contacts).unwrap();
        assert_eq!(custom.body, "ven ya");

        let blank = policy.build_job(&alert(Some("")), &contacts).unwrap();
        assert_eq!(blank.body, DEFAULT_MESSAGE);
    }

    #[test]
    fn no_contacts_means_no_job() {
        let policy = NotificationPolicy::default();
        assert!(policy.build_job(&alert(None), &[]).is_none());
        assert!(policy.build_job(&alert(None), &[contact("  ", true)]).is_none());
    }

    #[test]
    fn duplicate_addresses_collapse_and_keep_call_flag() {
        let policy = NotificationPolicy {
            call_scope: CallScope::PrimaryOnly,
            ..NotificationPolicy::default()
        };
        let contacts = [contact("+1", false), contact("+1", true)];

        let job = policy.build_job(&alert(None), &contacts).unwrap();

        assert_eq!(job.destinations.len(), 1);
        assert!(job.destinations[0].call);
    }

    #[test]
    fn scope_and_source_parse_from_config_strings() {
        assert_eq!("primary".parse::<CallScope>().unwrap(), CallScope::PrimaryOnly);
        assert_eq!(" ALL ".parse::<CallScope>().unwrap(), CallScope::All);
        assert_eq!("alert".parse::<MessageSource>().unwrap(), MessageSource::PerAlert);
        assert!("sometimes".parse::<CallScope>().is_err());
    }
}
