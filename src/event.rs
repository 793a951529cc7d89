//! Event sources and reported events.
//!
//! Pipeline components implement [`EventThrowing`] and report occurrences
//! through the [`MonitorManager`](crate::monitor::MonitorManager). The engine
//! only ever borrows sources through shared handles; it never owns them.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A component that may report monitoring events.
pub trait EventThrowing: Send + Sync + fmt::Debug {
    /// Name of the component inside its adapter (a pipe, a receiver, ...).
    fn event_source_name(&self) -> &str;

    /// Name of the adapter that owns the component, if any.
    fn adapter_name(&self) -> Option<&str>;
}

/// Identity of an event source: owning adapter plus source name.
///
/// Used as the key of the event registry; two handles describing the same
/// adapter and source are the same thrower.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    /// Owning adapter, if any.
    pub adapter: Option<String>,
    /// Source name inside the adapter.
    pub source: String,
}

impl SourceKey {
    /// Builds the key of a thrower.
    #[must_use]
    pub fn of(thrower: &dyn EventThrowing) -> Self {
        Self {
            adapter: thrower.adapter_name().map(str::to_string),
            source: thrower.event_source_name().to_string(),
        }
    }

    /// Display name used by the console, `"<adapter> / <source>"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} / {}", self.adapter.as_deref().unwrap_or(""), self.source)
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Plain value implementation of [`EventThrowing`].
///
/// # Examples
///
/// ```
/// use pipemon::{EventSource, EventThrowing};
///
/// let source = EventSource::new("OrderAdapter", "validate-pipe");
/// assert_eq!(source.adapter_name(), Some("OrderAdapter"));
/// assert_eq!(source.event_source_name(), "validate-pipe");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    adapter: Option<String>,
    name: String,
}

impl EventSource {
    /// A source owned by an adapter.
    #[must_use]
    pub fn new(adapter: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            adapter: Some(adapter.into()),
            name: name.into(),
        }
    }

    /// A source outside any adapter.
    #[must_use]
    pub fn standalone(name: impl Into<String>) -> Self {
        Self {
            adapter: None,
            name: name.into(),
        }
    }

    /// Wraps the source in the shared handle the manager expects.
    #[must_use]
    pub fn shared(self) -> Arc<dyn EventThrowing> {
        Arc::new(self)
    }
}

impl EventThrowing for EventSource {
    fn event_source_name(&self) -> &str {
        &self.name
    }

    fn adapter_name(&self) -> Option<&str> {
        self.adapter.as_deref()
    }
}

/// A reported occurrence.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct MonitorEvent {
    pub event_id: Uuid,
    pub event_code: String,
    pub source: Arc<dyn EventThrowing>,
    pub event_time: DateTime<Utc>,
    pub message: Option<String>,
}

impl MonitorEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(source: Arc<dyn EventThrowing>, event_code: impl Into<String>) -> Self {
        Self::at(source, event_code, Utc::now())
    }

    /// Creates an event with an explicit timestamp.
    #[must_use]
    pub fn at(source: Arc<dyn EventThrowing>, event_code: impl Into<String>, event_time: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_code: event_code.into(),
            source,
            event_time,
            message: None,
        }
    }

    /// Attaches a message payload.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Name of the adapter owning the source, if any.
    #[must_use]
    pub fn adapter_name(&self) -> Option<&str> {
        self.source.adapter_name()
    }

    /// Name of the source.
    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source.event_source_name()
    }
}
