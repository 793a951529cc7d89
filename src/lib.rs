//! # pipemon - Alarm monitoring for message pipelines
//!
//! pipemon turns events reported by pipeline components (adapters, pipes,
//! receivers) into alarm and clearing notifications. Monitors hold the alarm
//! state of one logical condition and only notify their destinations when that
//! state changes; triggers decide which events drive which monitor.
//!
//! ## Core Concepts
//!
//! - **Event source**: anything implementing [`EventThrowing`]
//! - **Trigger**: event-code subscription with adapter scoping and rate limiting
//! - **Monitor**: named alarm state with hysteresis and a set of destinations
//! - **Destination**: a sink for notifications ([`MonitorDestination`])
//! - **MonitorManager**: owned registry of monitors and destinations, and the
//!   entry point for reported events
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use pipemon::{AdapterFilter, EventSource, EventType, Monitor, MonitorManager, Severity, Trigger};
//! use pipemon::destination::LogDestination;
//!
//! let manager = MonitorManager::new();
//! manager.add_destination(Arc::new(LogDestination::new("log")))?;
//!
//! let monitor = Monitor::new("orders-backlog", EventType::Functional);
//! monitor.add_destination("log");
//! monitor.register_trigger(
//!     Trigger::alarm(Severity::Warning)
//!         .with_event_code("MESSAGE_REJECTED")
//!         .with_threshold(3, 60)
//!         .with_adapter_filter(AdapterFilter::new("Orders")),
//! );
//! monitor.register_trigger(Trigger::clearing(Severity::Warning).with_event_code("MESSAGE_ACCEPTED"));
//! manager.add_monitor(monitor)?;
//! manager.configure()?;
//!
//! let source = EventSource::new("Orders", "validate").shared();
//! for _ in 0..3 {
//!     manager.fire_event(&source, "MESSAGE_REJECTED");
//! }
//! assert!(manager.find_monitor("orders-backlog").unwrap().is_raised());
//! # Ok::<(), pipemon::MonitorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod destination;
pub mod error;
pub mod event;
pub mod filter;
pub mod monitor;
pub mod severity;
mod xml;

// Re-export primary types at crate root for convenience
pub use config::{load_config, ConfigError, MonitoringConfig};
pub use destination::{MonitorDestination, Notification};
pub use error::{ConfigurationError, DestinationError, MonitorError, MonitorResult};
pub use event::{EventSource, EventThrowing, MonitorEvent, SourceKey};
pub use filter::{AdapterFilter, SourceFiltering};
pub use monitor::{
    EventRegistry, ManagerStatus, Monitor, MonitorManager, MonitorStatus, Transition, Trigger, TriggerId,
    TriggerType,
};
pub use severity::{EventType, Severity};
