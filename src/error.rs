//! Error types for pipemon.
//!
//! Errors are strongly typed using thiserror. Configuration errors are fatal
//! for the monitor they concern; destination errors are isolated per
//! destination and only ever logged on the event path.

use thiserror::Error;

/// Structural problems detected while configuring monitors and triggers.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Trigger {trigger} has no owning monitor")]
    MissingOwner {
        trigger: String,
    },

    #[error("Trigger {trigger} of monitor '{monitor}' has threshold {threshold} but period {period}; period must be at least 1 second")]
    InvalidPeriod {
        monitor: String,
        trigger: String,
        threshold: u32,
        period: u32,
    },

    #[error("Monitor '{monitor}' references unknown destination '{destination}'")]
    UnknownDestination {
        monitor: String,
        destination: String,
    },

    #[error("Monitor '{name}' is already registered")]
    DuplicateMonitor {
        name: String,
    },

    #[error("Destination '{name}' is already registered")]
    DuplicateDestination {
        name: String,
    },

    #[error("Monitor '{monitor}' cannot have event type {event_type}")]
    InvalidMonitorType {
        monitor: String,
        event_type: String,
    },

    #[error("Invalid value '{value}' for {field}")]
    InvalidValue {
        field: String,
        value: String,
    },

    #[error("Destination '{name}' failed to configure: {reason}")]
    Destination {
        name: String,
        reason: String,
    },
}

/// Errors raised by a destination while delivering a notification.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DestinationError {
    #[error("Destination '{destination}' failed to send: {message}")]
    SendFailed {
        destination: String,
        message: String,
    },

    #[error("Destination '{destination}' is disconnected")]
    Disconnected {
        destination: String,
    },

    #[error("Failed to format notification: {message}")]
    Format {
        message: String,
    },

    #[error("Timed out after {duration_ms}ms waiting for a notification")]
    Timeout {
        duration_ms: u64,
    },
}

/// Top-level error type for pipemon.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Destination error: {0}")]
    Destination(#[from] DestinationError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl MonitorError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is a destination error.
    #[must_use]
    pub const fn is_destination(&self) -> bool {
        matches!(self, Self::Destination(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for pipemon operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
