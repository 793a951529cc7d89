use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use tracing::{debug, error};

use crate::error::{ConfigurationError, DestinationError};
use crate::event::MonitorEvent;
use crate::severity::{EventType, Severity};

use super::MonitorDestination;

/// Transport used by [`SenderDestination`] to ship formatted messages.
pub trait MessageSender: Send + Sync + fmt::Debug {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns a destination error when the message could not be delivered.
    fn send_message(&self, correlation_id: &str, message: &str) -> Result<(), DestinationError>;

    /// Opens the transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the transport cannot be opened.
    fn configure(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Closes the transport.
    fn close(&self) {}
}

/// Name of the local host, or `"localhost"` when it cannot be determined.
#[must_use]
pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string())
}

/// Destination formatting each notification as a single XML element and
/// handing it to a [`MessageSender`]:
///
/// ```text
/// <event hostname="H" monitor="M" source="S" type="T" severity="SEV" event="CODE"/>
/// ```
///
/// Send failures are logged and swallowed so one broken transport never
/// affects the other destinations of a monitor.
#[derive(Debug)]
pub struct SenderDestination<S: MessageSender> {
    name: String,
    hostname: String,
    sender: S,
}

impl<S: MessageSender> SenderDestination<S> {
    /// A destination reporting the local host name.
    #[must_use]
    pub fn new(name: impl Into<String>, sender: S) -> Self {
        Self {
            name: name.into(),
            hostname: local_hostname(),
            sender,
        }
    }

    /// Overrides the reported host name.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Host name written into every message.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The underlying transport.
    #[must_use]
    pub const fn sender(&self) -> &S {
        &self.sender
    }

    /// Renders the notification element.
    ///
    /// # Errors
    ///
    /// Returns `DestinationError::Format` if the element cannot be written.
    pub fn format_event(
        &self,
        monitor: &str,
        event_type: EventType,
        severity: Severity,
        event_code: &str,
        event: &MonitorEvent,
    ) -> Result<String, DestinationError> {
        let mut element = BytesStart::new("event");
        element.push_attribute(("hostname", self.hostname.as_str()));
        element.push_attribute(("monitor", monitor));
        element.push_attribute(("source", event.source_name()));
        element.push_attribute(("type", event_type.as_str()));
        element.push_attribute(("severity", severity.as_str()));
        element.push_attribute(("event", event_code));

        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Empty(element))
            .map_err(|err| DestinationError::Format {
                message: err.to_string(),
            })?;
        String::from_utf8(writer.into_inner()).map_err(|err| DestinationError::Format {
            message: err.to_string(),
        })
    }
}

impl<S: MessageSender> MonitorDestination for SenderDestination<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "sender"
    }

    fn configure(&self) -> Result<(), ConfigurationError> {
        self.sender.configure()
    }

    fn fire_event(
        &self,
        monitor: &str,
        event_type: EventType,
        severity: Severity,
        event_code: &str,
        event: &MonitorEvent,
    ) -> Result<(), DestinationError> {
        let message = self.format_event(monitor, event_type, severity, event_code, event)?;
        let correlation_id = event.event_id.to_string();
        match self.sender.send_message(&correlation_id, &message) {
            Ok(()) => {
                debug!(destination = %self.name, monitor = %monitor, event_code = %event_code, "notification sent");
            }
            Err(err) => {
                error!(
                    destination = %self.name,
                    monitor = %monitor,
                    event_code = %event_code,
                    error = %err,
                    "could not send notification"
                );
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.sender.close();
    }
}
