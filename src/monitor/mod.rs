//! Monitoring engine.
//!
//! Events reported through the [`MonitorManager`] are offered to every
//! configured [`Trigger`]. Triggers filter on event code and adapter,
//! rate-limit through a [`SlidingWindow`], and drive the alarm state of their
//! owning [`Monitor`], which notifies its destinations on state changes only.
//! Everything runs synchronously on the reporting thread.

/// Manager: monitor and destination registry, event dispatch.
pub mod manager;
/// Declared event sources.
pub mod registry;
/// Monitor state machine.
pub mod state;
/// Trigger definitions and filtering.
pub mod trigger;
/// Sliding window rate limiting.
pub mod window;

pub use manager::{ManagerStatus, MonitorManager};
pub use registry::EventRegistry;
pub use state::{Monitor, MonitorStatus, Transition};
pub use trigger::{Trigger, TriggerId, TriggerType};
pub use window::SlidingWindow;
