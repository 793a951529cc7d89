//! Severity levels and notification types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Escalation level of an alarm.
///
/// Severities are totally ordered; a monitor only re-notifies when an alarm
/// arrives at a strictly higher severity than the one it is raised at.
///
/// # Examples
///
/// ```
/// use pipemon::Severity;
///
/// assert!(Severity::Warning < Severity::Critical);
/// assert_eq!("fatal".parse::<Severity>().unwrap(), Severity::Fatal);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Severity {
    /// Informational, no action needed.
    Harmless,
    /// Degraded behaviour worth a look.
    Warning,
    /// Functionality is impaired.
    Critical,
    /// The pipeline cannot operate.
    Fatal,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Self; 4] = [Self::Harmless, Self::Warning, Self::Critical, Self::Fatal];

    /// Returns the canonical upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Harmless => "HARMLESS",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigurationError::InvalidValue {
                field: "severity".to_string(),
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for Severity {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Classification carried into outgoing notifications.
///
/// `Technical` and `Functional` classify monitors; `Clearing` is the type of
/// the notification sent when a raised monitor clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum EventType {
    /// Infrastructure problems such as a lost connection.
    Technical,
    /// Business-level problems in the processed messages.
    Functional,
    /// A raised monitor went back to normal.
    Clearing,
}

impl EventType {
    /// Returns the canonical upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "TECHNICAL",
            Self::Functional => "FUNCTIONAL",
            Self::Clearing => "CLEARING",
        }
    }

    /// Returns true for the types a monitor may be configured with.
    #[must_use]
    pub const fn is_alarm_type(self) -> bool {
        !matches!(self, Self::Clearing)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TECHNICAL" => Ok(Self::Technical),
            "FUNCTIONAL" => Ok(Self::Functional),
            "CLEARING" => Ok(Self::Clearing),
            _ => Err(ConfigurationError::InvalidValue {
                field: "event type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EventType {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
