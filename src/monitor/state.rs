//! Monitors: named alarm state with hysteresis.
//!
//! A monitor is either clear or raised at some severity. It only notifies its
//! destinations on a rising edge (first alarm, or an alarm at a strictly
//! higher severity) and on an explicit clear. Repeated hits at or above the
//! raised severity are counted but not re-notified; lower ones are ignored.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{ConfigurationError, MonitorResult};
use crate::event::{EventThrowing, MonitorEvent, SourceKey};
use crate::severity::{EventType, Severity};

use super::manager::MonitorManager;
use super::trigger::{Trigger, TriggerId};

#[derive(Debug, Default)]
struct MonitorState {
    raised: bool,
    alarm_severity: Option<Severity>,
    state_changed: Option<DateTime<Utc>>,
    last_hit: Option<DateTime<Utc>>,
    additional_hit_count: u64,
    raised_by_event_code: Option<String>,
    raised_by_source: Option<Arc<dyn EventThrowing>>,
}

/// Outcome of a single [`Monitor::change_state`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    /// Severity of the clearing notification sent, if any.
    pub cleared: Option<Severity>,
    /// Severity of the alarm notification sent, if any.
    pub raised: Option<Severity>,
    /// True when the call only counted a repeated hit.
    pub repeated_hit: bool,
}

impl Transition {
    /// True when the monitor notified its destinations.
    #[must_use]
    pub const fn is_state_change(&self) -> bool {
        self.cleared.is_some() || self.raised.is_some()
    }
}

/// Point-in-time view of a monitor.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub name: String,
    pub event_type: EventType,
    pub raised: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_changed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hit: Option<DateTime<Utc>>,
    pub additional_hit_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raised_by_event_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raised_by_source: Option<SourceKey>,
    pub destinations: Vec<String>,
}

/// A named alerting aggregate for one logical condition.
///
/// Monitors are created shared so their triggers can refer back to them:
///
/// ```
/// use pipemon::{EventType, Monitor, Severity, Trigger};
///
/// let monitor = Monitor::new("queue-down", EventType::Technical);
/// monitor.add_destination("log");
/// monitor.register_trigger(Trigger::alarm(Severity::Critical).with_event_code("QUEUE_DOWN"));
/// monitor.register_trigger(Trigger::clearing(Severity::Critical).with_event_code("QUEUE_UP"));
/// assert_eq!(monitor.triggers().len(), 2);
/// assert!(!monitor.is_raised());
/// ```
#[derive(Debug)]
pub struct Monitor {
    name: String,
    event_type: EventType,
    triggers: RwLock<Vec<Arc<Trigger>>>,
    destinations: RwLock<BTreeSet<String>>,
    state: Mutex<MonitorState>,
}

impl Monitor {
    /// A clear monitor with no triggers and no destinations.
    #[must_use]
    pub fn new(name: impl Into<String>, event_type: EventType) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            event_type,
            triggers: RwLock::new(Vec::new()),
            destinations: RwLock::new(BTreeSet::new()),
            state: Mutex::new(MonitorState::default()),
        })
    }

    /// Unique name within a manager.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event type used for alarm notifications.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_triggers(&self) -> RwLockReadGuard<'_, Vec<Arc<Trigger>>> {
        self.triggers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_triggers(&self) -> RwLockWriteGuard<'_, Vec<Arc<Trigger>>> {
        self.triggers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a trigger to this monitor and returns the shared handle.
    ///
    /// Triggers registered after [`MonitorManager::configure`] only receive
    /// events after the next `configure` call.
    pub fn register_trigger(self: &Arc<Self>, trigger: Trigger) -> Arc<Trigger> {
        let trigger = Arc::new(trigger.attach(Arc::downgrade(self)));
        self.write_triggers().push(Arc::clone(&trigger));
        trigger
    }

    /// Detaches a trigger. Unknown ids are ignored.
    pub fn remove_trigger(&self, id: TriggerId) -> Option<Arc<Trigger>> {
        let mut triggers = self.write_triggers();
        let pos = triggers.iter().position(|t| t.id() == id)?;
        Some(triggers.remove(pos))
    }

    /// Snapshot of the registered triggers, in registration order.
    #[must_use]
    pub fn triggers(&self) -> Vec<Arc<Trigger>> {
        self.read_triggers().clone()
    }

    /// Adds a destination by name; it is resolved at configure time.
    pub fn add_destination(&self, name: impl Into<String>) {
        self.destinations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
    }

    /// Replaces the destination set.
    pub fn set_destinations<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        *self.destinations.write().unwrap_or_else(PoisonError::into_inner) = names;
    }

    /// Destination names, sorted.
    #[must_use]
    pub fn destination_names(&self) -> Vec<String> {
        self.destinations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Validates the monitor against the manager and configures its triggers.
    ///
    /// # Errors
    ///
    /// Fails when the monitor type is `Clearing`, when a destination name does
    /// not resolve in `manager`, or when a trigger fails to configure.
    pub fn configure(&self, manager: &MonitorManager) -> Result<(), ConfigurationError> {
        if !self.event_type.is_alarm_type() {
            return Err(ConfigurationError::InvalidMonitorType {
                monitor: self.name.clone(),
                event_type: self.event_type.to_string(),
            });
        }

        for destination in self.destination_names() {
            if manager.destination(&destination).is_none() {
                return Err(ConfigurationError::UnknownDestination {
                    monitor: self.name.clone(),
                    destination,
                });
            }
        }

        for trigger in self.triggers() {
            trigger.configure()?;
        }
        Ok(())
    }

    /// Applies an alarm (`alarm == true`) or a clearing at `severity`.
    ///
    /// The whole decision, the state mutation, the destination notifications
    /// and the reset of opposite-type trigger windows run under this monitor's
    /// state lock.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidMonitorType` when the monitor was
    /// built with the `Clearing` type; state is left untouched.
    pub fn change_state(
        &self,
        manager: &MonitorManager,
        alarm: bool,
        severity: Severity,
        event: &MonitorEvent,
    ) -> MonitorResult<Transition> {
        if !self.event_type.is_alarm_type() {
            return Err(ConfigurationError::InvalidMonitorType {
                monitor: self.name.clone(),
                event_type: self.event_type.to_string(),
            }
            .into());
        }

        let mut state = self.lock_state();
        let mut transition = Transition::default();

        let up = alarm && (!state.raised || state.alarm_severity.map_or(true, |current| current < severity));
        let clear = state.raised
            && (!alarm || (up && state.alarm_severity.is_some_and(|current| current != severity)));

        if clear {
            let clear_severity = state.alarm_severity.unwrap_or(severity);
            let event_code = state
                .raised_by_event_code
                .clone()
                .unwrap_or_else(|| event.event_code.clone());
            self.notify_destinations(manager, EventType::Clearing, clear_severity, &event_code, event);
            state.raised_by_event_code = None;
            state.raised_by_source = None;
            transition.cleared = Some(clear_severity);
        }

        if up {
            self.notify_destinations(manager, self.event_type, severity, &event.event_code, event);
            state.raised_by_event_code = Some(event.event_code.clone());
            state.raised_by_source = Some(Arc::clone(&event.source));
            state.alarm_severity = Some(severity);
            state.last_hit = Some(event.event_time);
            state.additional_hit_count = 0;
            transition.raised = Some(severity);
        } else if alarm && state.alarm_severity.map_or(true, |current| severity >= current) {
            state.last_hit = Some(event.event_time);
            state.additional_hit_count += 1;
            transition.repeated_hit = true;
        }

        state.raised = alarm;

        if transition.is_state_change() {
            let now = Utc::now();
            state.state_changed = Some(now);
            manager.register_state_change(now);
            info!(
                monitor = %self.name,
                raised = alarm,
                severity = %severity,
                event_code = %event.event_code,
                "monitor changed state"
            );
        }

        self.clear_opposite_triggers(alarm);
        Ok(transition)
    }

    fn clear_opposite_triggers(&self, alarm: bool) {
        for trigger in self.read_triggers().iter() {
            if trigger.is_alarm() != alarm {
                trigger.clear_events();
            }
        }
    }

    fn notify_destinations(
        &self,
        manager: &MonitorManager,
        event_type: EventType,
        severity: Severity,
        event_code: &str,
        event: &MonitorEvent,
    ) {
        for name in self.destination_names() {
            let Some(destination) = manager.destination(&name) else {
                warn!(monitor = %self.name, destination = %name, "destination no longer registered");
                continue;
            };
            if let Err(err) = destination.fire_event(&self.name, event_type, severity, event_code, event) {
                error!(
                    monitor = %self.name,
                    destination = %name,
                    event_code = %event_code,
                    error = %err,
                    "failed to notify destination"
                );
            }
        }
    }

    /// True while an alarm is outstanding.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.lock_state().raised
    }

    /// Severity of the last alarm that raised this monitor.
    #[must_use]
    pub fn alarm_severity(&self) -> Option<Severity> {
        self.lock_state().alarm_severity
    }

    /// Alarm hits counted since the last rising edge.
    #[must_use]
    pub fn additional_hit_count(&self) -> u64 {
        self.lock_state().additional_hit_count
    }

    /// Event time of the last counted alarm hit.
    #[must_use]
    pub fn last_hit(&self) -> Option<DateTime<Utc>> {
        self.lock_state().last_hit
    }

    /// Point-in-time copy of the monitor state.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        let state = self.lock_state();
        MonitorStatus {
            name: self.name.clone(),
            event_type: self.event_type,
            raised: state.raised,
            alarm_severity: state.alarm_severity,
            state_changed: state.state_changed,
            last_hit: state.last_hit,
            additional_hit_count: state.additional_hit_count,
            raised_by_event_code: state.raised_by_event_code.clone(),
            raised_by_source: state.raised_by_source.as_deref().map(SourceKey::of),
            destinations: self.destination_names(),
        }
    }
}
