//! Notification sinks.
//!
//! A monitor notifies every destination it names on each state change.
//! Destinations are registered on the [`MonitorManager`](crate::MonitorManager)
//! under a unique name and shared between monitors.

/// Bounded in-process channel destination.
pub mod channel;
/// `tracing` destination.
pub mod log;
/// XML formatting destination over a pluggable sender.
pub mod sender;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DestinationError};
use crate::event::{MonitorEvent, SourceKey};
use crate::severity::{EventType, Severity};

pub use channel::{ChannelDestination, NotificationStream};
pub use log::LogDestination;
pub use sender::{local_hostname, MessageSender, SenderDestination};

/// A sink for monitor notifications.
///
/// `fire_event` runs on the thread that reported the event, while the
/// monitor's state lock is held. Implementations must not call back into the
/// manager.
pub trait MonitorDestination: Send + Sync + fmt::Debug {
    /// Unique registration name.
    fn name(&self) -> &str;

    /// Short type label used in the configuration export.
    fn kind(&self) -> &'static str;

    /// Prepares the destination. Called by `MonitorManager::configure`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the destination cannot be used.
    fn configure(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Delivers one notification.
    ///
    /// # Errors
    ///
    /// Returns a destination error on delivery failure; the caller logs it and
    /// continues with the next destination.
    fn fire_event(
        &self,
        monitor: &str,
        event_type: EventType,
        severity: Severity,
        event_code: &str,
        event: &MonitorEvent,
    ) -> Result<(), DestinationError>;

    /// Releases resources. Called by `MonitorManager::shutdown`.
    fn close(&self) {}
}

/// A notification as delivered to a destination.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub monitor: String,
    pub event_type: EventType,
    pub severity: Severity,
    pub event_code: String,
    pub source: SourceKey,
    pub event_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Notification {
    /// Captures the arguments of a `fire_event` call.
    #[must_use]
    pub fn new(monitor: &str, event_type: EventType, severity: Severity, event_code: &str, event: &MonitorEvent) -> Self {
        Self {
            monitor: monitor.to_string(),
            event_type,
            severity,
            event_code: event_code.to_string(),
            source: SourceKey::of(event.source.as_ref()),
            event_time: event.event_time,
            message: event.message.clone(),
        }
    }

    /// True for alarm notifications, false for clearings.
    #[must_use]
    pub const fn is_alarm(&self) -> bool {
        self.event_type.is_alarm_type()
    }
}
