//! Triggers: event-code subscriptions that drive monitor state.
//!
//! A trigger filters incoming events on event code and adapter, optionally
//! rate-limits them through a sliding window, and forwards the survivors to
//! its owning [`Monitor`] as an alarm or a clearing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::ConfigurationError;
use crate::event::MonitorEvent;
use crate::filter::{AdapterFilter, SourceFiltering};
use crate::severity::Severity;

use super::manager::MonitorManager;
use super::state::Monitor;
use super::window::SlidingWindow;

/// Unique identifier for a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(Uuid);

impl TriggerId {
    /// Create a new random trigger id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TriggerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a trigger raises or clears its monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum TriggerType {
    /// Raises the monitor at the trigger's severity.
    Alarm,
    /// Clears the monitor.
    Clearing,
}

impl TriggerType {
    /// True for [`TriggerType::Alarm`].
    #[must_use]
    pub const fn is_alarm(self) -> bool {
        matches!(self, Self::Alarm)
    }

    /// Returns the canonical upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alarm => "ALARM",
            Self::Clearing => "CLEARING",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALARM" => Ok(Self::Alarm),
            "CLEARING" => Ok(Self::Clearing),
            _ => Err(ConfigurationError::InvalidValue {
                field: "trigger type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for TriggerType {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A rule turning matching events into monitor state changes.
///
/// Triggers are built with the `with_*` methods and then handed to
/// [`Monitor::register_trigger`], which attaches the owning monitor.
///
/// # Examples
///
/// ```
/// use pipemon::{AdapterFilter, Severity, Trigger};
///
/// let trigger = Trigger::alarm(Severity::Critical)
///     .with_event_code("QUEUE_DOWN")
///     .with_threshold(3, 60)
///     .with_adapter_filter(AdapterFilter::new("OrderAdapter"));
/// assert!(trigger.is_alarm());
/// assert!(trigger.subscribes_to("QUEUE_DOWN"));
/// ```
#[derive(Debug)]
pub struct Trigger {
    id: TriggerId,
    trigger_type: TriggerType,
    is_alarm: bool,
    severity: Severity,
    threshold: u32,
    period: u32,
    event_codes: BTreeSet<String>,
    adapter_filters: BTreeMap<String, AdapterFilter>,
    owner: Weak<Monitor>,
    window: Mutex<SlidingWindow>,
    configured: AtomicBool,
}

impl Trigger {
    /// A trigger of the given type and severity, without subscriptions.
    #[must_use]
    pub fn new(trigger_type: TriggerType, severity: Severity) -> Self {
        Self {
            id: TriggerId::new(),
            trigger_type,
            is_alarm: trigger_type.is_alarm(),
            severity,
            threshold: 0,
            period: 0,
            event_codes: BTreeSet::new(),
            adapter_filters: BTreeMap::new(),
            owner: Weak::new(),
            window: Mutex::new(SlidingWindow::new(0)),
            configured: AtomicBool::new(false),
        }
    }

    /// Shorthand for `Trigger::new(TriggerType::Alarm, severity)`.
    #[must_use]
    pub fn alarm(severity: Severity) -> Self {
        Self::new(TriggerType::Alarm, severity)
    }

    /// Shorthand for `Trigger::new(TriggerType::Clearing, severity)`.
    #[must_use]
    pub fn clearing(severity: Severity) -> Self {
        Self::new(TriggerType::Clearing, severity)
    }

    /// Subscribes to an event code.
    #[must_use]
    pub fn with_event_code(mut self, code: impl Into<String>) -> Self {
        self.event_codes.insert(code.into());
        self
    }

    /// Subscribes to several event codes.
    #[must_use]
    pub fn with_event_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_codes.extend(codes.into_iter().map(Into::into));
        self
    }

    /// Requires `threshold` matching events within `period` seconds before the
    /// monitor is invoked. A threshold of 0 disables rate limiting.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32, period: u32) -> Self {
        self.threshold = threshold;
        self.period = period;
        self.window = Mutex::new(SlidingWindow::new(period));
        self
    }

    /// Restricts the trigger to an adapter. A later filter for the same adapter
    /// replaces the earlier one.
    #[must_use]
    pub fn with_adapter_filter(mut self, filter: AdapterFilter) -> Self {
        self.adapter_filters.insert(filter.adapter().to_string(), filter);
        self
    }

    pub(crate) fn attach(mut self, owner: Weak<Monitor>) -> Self {
        self.owner = owner;
        self
    }

    /// Identity of this trigger, stable for its lifetime.
    #[must_use]
    pub const fn id(&self) -> TriggerId {
        self.id
    }

    /// Whether the trigger raises or clears.
    #[must_use]
    pub const fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    /// True for alarm triggers.
    #[must_use]
    pub const fn is_alarm(&self) -> bool {
        self.is_alarm
    }

    /// Severity forwarded to the monitor.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Hits needed within [`period`](Self::period); 0 means every hit counts.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Window length in seconds.
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Subscribed event codes, sorted.
    pub fn event_codes(&self) -> impl Iterator<Item = &str> {
        self.event_codes.iter().map(String::as_str)
    }

    /// True when `event_code` is one of the subscriptions.
    #[must_use]
    pub fn subscribes_to(&self, event_code: &str) -> bool {
        self.event_codes.contains(event_code)
    }

    /// Adapter filters, ordered by adapter name.
    pub fn adapter_filters(&self) -> impl Iterator<Item = &AdapterFilter> {
        self.adapter_filters.values()
    }

    /// Filtering level implied by the adapter filters.
    #[must_use]
    pub fn source_filtering(&self) -> SourceFiltering {
        SourceFiltering::derive(self.adapter_filters.values())
    }

    /// The owning monitor, if it is still alive.
    #[must_use]
    pub fn owner(&self) -> Option<Arc<Monitor>> {
        self.owner.upgrade()
    }

    /// True once [`configure`](Self::configure) has succeeded.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    /// Number of hits currently held in the sliding window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.lock_window().len()
    }

    fn lock_window(&self) -> MutexGuard<'_, SlidingWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn owner_name(&self) -> String {
        self.owner
            .upgrade()
            .map_or_else(|| "<none>".to_string(), |m| m.name().to_string())
    }

    /// Validates the trigger and resets its window.
    ///
    /// Already configured triggers are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MissingOwner` when the trigger was never
    /// registered on a monitor, and `ConfigurationError::InvalidPeriod` when a
    /// threshold is set with a period shorter than one second.
    pub fn configure(&self) -> Result<(), ConfigurationError> {
        if self.is_configured() {
            return Ok(());
        }

        let Some(monitor) = self.owner.upgrade() else {
            return Err(ConfigurationError::MissingOwner {
                trigger: self.id.to_string(),
            });
        };

        if self.event_codes.is_empty() {
            warn!(monitor = %monitor.name(), trigger = %self.id, "trigger subscribes to no event codes");
        }

        if self.threshold > 0 && self.period < 1 {
            return Err(ConfigurationError::InvalidPeriod {
                monitor: monitor.name().to_string(),
                trigger: self.id.to_string(),
                threshold: self.threshold,
                period: self.period,
            });
        }

        *self.lock_window() = SlidingWindow::new(self.period);
        self.configured.store(true, Ordering::Release);
        Ok(())
    }

    /// Evaluates a dispatched event.
    ///
    /// Returns true when the event passed filtering and rate limiting and the
    /// owning monitor was invoked.
    pub fn on_event(&self, event: &MonitorEvent, manager: &MonitorManager) -> bool {
        if !self.subscribes_to(&event.event_code) {
            return false;
        }

        if !self.adapter_filters.is_empty() {
            let in_scope = event
                .adapter_name()
                .is_some_and(|adapter| self.adapter_filters.contains_key(adapter));
            if !in_scope {
                debug!(
                    trigger = %self.id,
                    event_code = %event.event_code,
                    adapter = event.adapter_name().unwrap_or("<none>"),
                    "event outside adapter filter"
                );
                return false;
            }
        }

        self.change_state(event, manager)
    }

    fn change_state(&self, event: &MonitorEvent, manager: &MonitorManager) -> bool {
        if self.threshold > 0 {
            // The window guard is dropped before the monitor is called; the
            // monitor locks sibling windows while holding its own state lock.
            let hits = self.lock_window().record(event.event_time);
            if hits < usize::try_from(self.threshold).unwrap_or(usize::MAX) {
                debug!(
                    trigger = %self.id,
                    event_code = %event.event_code,
                    hits,
                    threshold = self.threshold,
                    "below threshold"
                );
                return false;
            }
        }

        let Some(monitor) = self.owner.upgrade() else {
            warn!(trigger = %self.id, "owning monitor is gone, dropping event");
            return false;
        };

        match monitor.change_state(manager, self.is_alarm, self.severity, event) {
            Ok(_) => true,
            Err(err) => {
                error!(monitor = %self.owner_name(), trigger = %self.id, error = %err, "monitor rejected state change");
                false
            }
        }
    }

    /// Empties the sliding window.
    pub fn clear_events(&self) {
        self.lock_window().clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::destination::{ChannelDestination, NotificationStream};
    use crate::event::{EventSource, EventThrowing};
    use crate::severity::EventType;

    fn setup(trigger: Trigger) -> (MonitorManager, Arc<Monitor>, Arc<Trigger>, NotificationStream) {
        let manager = MonitorManager::new();
        let (dest, stream) = ChannelDestination::bounded("sink", 64);
        manager.add_destination(Arc::new(dest)).unwrap();

        let monitor = Monitor::new("m", EventType::Technical);
        monitor.add_destination("sink");
        let trigger = monitor.register_trigger(trigger);
        manager.add_monitor(Arc::clone(&monitor)).unwrap();
        manager.configure().unwrap();
        (manager, monitor, trigger, stream)
    }

    fn source(adapter: &str) -> Arc<dyn EventThrowing> {
        EventSource::new(adapter, "pipe").shared()
    }

    #[test]
    fn trigger_type_deserializes_in_any_case() {
        let parsed: Vec<TriggerType> = serde_json::from_str(r#"["alarm", "Clearing", "ALARM"]"#).unwrap();
        assert_eq!(parsed, vec![TriggerType::Alarm, TriggerType::Clearing, TriggerType::Alarm]);
        assert_eq!(serde_json::to_string(&TriggerType::Clearing).unwrap(), "\"CLEARING\"");
    }

    #[test]
    fn unattached_trigger_fails_configuration() {
        let trigger = Trigger::alarm(Severity::Warning).with_event_code("E1");
        let err = trigger.configure().unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingOwner { .. }));
        assert!(!trigger.is_configured());
    }

    #[test]
    fn threshold_without_period_fails_configuration() {
        let monitor = Monitor::new("m", EventType::Technical);
        let trigger = monitor.register_trigger(Trigger::alarm(Severity::Warning).with_event_code("E1").with_threshold(2, 0));
        let err = trigger.configure().unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidPeriod {
                monitor: "m".to_string(),
                trigger: trigger.id().to_string(),
                threshold: 2,
                period: 0,
            }
        );
    }

    #[test]
    fn trigger_without_event_codes_still_configures() {
        let monitor = Monitor::new("m", EventType::Technical);
        let trigger = monitor.register_trigger(Trigger::alarm(Severity::Warning));
        trigger.configure().unwrap();
        assert!(trigger.is_configured());
    }

    #[test]
    fn unsubscribed_event_code_is_ignored() {
        let (manager, monitor, trigger, _stream) = setup(Trigger::alarm(Severity::Warning).with_event_code("E1"));
        let ev = MonitorEvent::new(source("A"), "E2");
        assert!(!trigger.on_event(&ev, &manager));
        assert!(!monitor.is_raised());
    }

    #[test]
    fn empty_filter_map_matches_any_adapter() {
        let (manager, monitor, trigger, _stream) = setup(Trigger::alarm(Severity::Warning).with_event_code("E1"));
        assert!(trigger.on_event(&MonitorEvent::new(source("anything"), "E1"), &manager));
        assert!(monitor.is_raised());
    }

    #[test]
    fn adapter_filter_blocks_other_adapters() {
        let (manager, monitor, trigger, stream) = setup(
            Trigger::alarm(Severity::Warning)
                .with_event_code("E1")
                .with_adapter_filter(AdapterFilter::new("A").with_sub_object("some-pipe")),
        );

        assert!(!trigger.on_event(&MonitorEvent::new(source("B"), "E1"), &manager));
        let standalone = EventSource::standalone("scheduler").shared();
        assert!(!trigger.on_event(&MonitorEvent::new(standalone, "E1"), &manager));
        assert!(!monitor.is_raised());
        assert!(stream.try_recv().is_none());

        // Matching is on the adapter only, not on the sub-objects.
        assert!(trigger.on_event(&MonitorEvent::new(source("A"), "E1"), &manager));
        assert!(monitor.is_raised());
    }

    #[test]
    fn threshold_gates_until_enough_hits_within_period() {
        let (manager, monitor, trigger, stream) =
            setup(Trigger::alarm(Severity::Warning).with_event_code("E1").with_threshold(3, 60));
        let src = source("A");
        let t0 = Utc::now();

        assert!(!trigger.on_event(&MonitorEvent::at(Arc::clone(&src), "E1", t0), &manager));
        assert!(!trigger.on_event(&MonitorEvent::at(Arc::clone(&src), "E1", t0 + Duration::seconds(10)), &manager));
        assert!(stream.try_recv().is_none());

        // Both earlier hits have aged out by now.
        assert!(!trigger.on_event(&MonitorEvent::at(Arc::clone(&src), "E1", t0 + Duration::seconds(75)), &manager));
        assert_eq!(trigger.window_len(), 1);
        assert!(!monitor.is_raised());
    }

    #[test]
    fn clear_events_resets_the_count() {
        let (manager, _monitor, trigger, _stream) =
            setup(Trigger::alarm(Severity::Warning).with_event_code("E1").with_threshold(2, 60));
        let t0 = Utc::now();
        assert!(!trigger.on_event(&MonitorEvent::at(source("A"), "E1", t0), &manager));
        trigger.clear_events();
        assert_eq!(trigger.window_len(), 0);
        assert!(!trigger.on_event(&MonitorEvent::at(source("A"), "E1", t0 + Duration::seconds(1)), &manager));
    }

    #[test]
    fn trigger_type_parses() {
        assert_eq!("alarm".parse::<TriggerType>().unwrap(), TriggerType::Alarm);
        assert_eq!("CLEARING".parse::<TriggerType>().unwrap(), TriggerType::Clearing);
        assert!("raise".parse::<TriggerType>().is_err());
        assert!(Trigger::alarm(Severity::Harmless).is_alarm());
        assert!(!Trigger::clearing(Severity::Harmless).is_alarm());
    }
}
