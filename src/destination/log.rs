use tracing::{error, info, warn};

use crate::error::DestinationError;
use crate::event::MonitorEvent;
use crate::severity::{EventType, Severity};

use super::MonitorDestination;

/// Destination writing one `tracing` record per notification.
///
/// Alarms are logged at a level following their severity; clearings are
/// always logged at info.
#[derive(Debug, Clone)]
pub struct LogDestination {
    name: String,
}

impl LogDestination {
    /// A destination registered under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl MonitorDestination for LogDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "log"
    }

    fn fire_event(
        &self,
        monitor: &str,
        event_type: EventType,
        severity: Severity,
        event_code: &str,
        event: &MonitorEvent,
    ) -> Result<(), DestinationError> {
        let source = event.source_name();
        let adapter = event.adapter_name().unwrap_or("");
        let message = event.message.as_deref().unwrap_or("");

        match (event_type, severity) {
            (EventType::Clearing, _) | (_, Severity::Harmless) => info!(
                destination = %self.name,
                monitor = %monitor,
                event_type = %event_type,
                severity = %severity,
                event_code = %event_code,
                adapter = %adapter,
                source = %source,
                message = %message,
                "monitor notification"
            ),
            (_, Severity::Warning) => warn!(
                destination = %self.name,
                monitor = %monitor,
                event_type = %event_type,
                severity = %severity,
                event_code = %event_code,
                adapter = %adapter,
                source = %source,
                message = %message,
                "monitor notification"
            ),
            (_, Severity::Critical | Severity::Fatal) => error!(
                destination = %self.name,
                monitor = %monitor,
                event_type = %event_type,
                severity = %severity,
                event_code = %event_code,
                adapter = %adapter,
                source = %source,
                message = %message,
                "monitor notification"
            ),
        }
        Ok(())
    }
}
