//! Monitor manager: registry of monitors and destinations, and event dispatch.
//!
//! The manager owns the named monitors and destinations and keeps an explicit
//! observer list of configured triggers. `fire_event` runs synchronously on
//! the caller's thread: every listener sees the event and decides on its own
//! whether it is relevant.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::destination::{local_hostname, MonitorDestination};
use crate::error::{ConfigurationError, MonitorResult};
use crate::event::{EventThrowing, MonitorEvent, SourceKey};
use crate::xml;

use super::registry::EventRegistry;
use super::state::{Monitor, MonitorStatus};
use super::trigger::{Trigger, TriggerId};

/// Point-in-time view of every monitor.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerStatus {
    pub hostname: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_state_change: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
    pub monitors: Vec<MonitorStatus>,
}

/// Registry and dispatcher for monitors.
///
/// Lifecycle: register destinations and monitors, call
/// [`configure`](Self::configure), fire events, and finally
/// [`shutdown`](Self::shutdown).
///
/// ```
/// use std::sync::Arc;
/// use pipemon::{EventSource, EventType, Monitor, MonitorManager, Severity, Trigger};
/// use pipemon::destination::ChannelDestination;
///
/// let manager = MonitorManager::new();
/// let (sink, stream) = ChannelDestination::bounded("sink", 16);
/// manager.add_destination(Arc::new(sink)).unwrap();
///
/// let monitor = Monitor::new("queue-down", EventType::Technical);
/// monitor.add_destination("sink");
/// monitor.register_trigger(Trigger::alarm(Severity::Critical).with_event_code("QUEUE_DOWN"));
/// manager.add_monitor(monitor).unwrap();
/// manager.configure().unwrap();
///
/// let source = EventSource::new("Orders", "listener").shared();
/// manager.fire_event(&source, "QUEUE_DOWN");
/// assert_eq!(stream.try_recv().unwrap().severity, Severity::Critical);
/// ```
#[derive(Debug)]
pub struct MonitorManager {
    hostname: String,
    enabled: AtomicBool,
    monitors: RwLock<Vec<Arc<Monitor>>>,
    destinations: RwLock<BTreeMap<String, Arc<dyn MonitorDestination>>>,
    listeners: RwLock<Vec<Arc<Trigger>>>,
    registry: RwLock<EventRegistry>,
    last_state_change: Mutex<Option<DateTime<Utc>>>,
}

impl Default for MonitorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorManager {
    /// An empty, enabled manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hostname: local_hostname(),
            enabled: AtomicBool::new(true),
            monitors: RwLock::new(Vec::new()),
            destinations: RwLock::new(BTreeMap::new()),
            listeners: RwLock::new(Vec::new()),
            registry: RwLock::new(EventRegistry::new()),
            last_state_change: Mutex::new(None),
        }
    }

    /// Overrides the host name reported in status and export documents.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Host name reported in status and export documents.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn read_monitors(&self) -> RwLockReadGuard<'_, Vec<Arc<Monitor>>> {
        self.monitors.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_monitors(&self) -> RwLockWriteGuard<'_, Vec<Arc<Monitor>>> {
        self.monitors.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_destinations(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<dyn MonitorDestination>>> {
        self.destinations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_listeners(&self) -> RwLockWriteGuard<'_, Vec<Arc<Trigger>>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, EventRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while events are dispatched.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enables or disables dispatch. While disabled, `fire_event` is a no-op.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    // ---- monitors ----------------------------------------------------------

    /// Registers a monitor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateMonitor` when a monitor with the
    /// same name is already registered.
    pub fn add_monitor(&self, monitor: Arc<Monitor>) -> Result<(), ConfigurationError> {
        let mut monitors = self.write_monitors();
        if monitors.iter().any(|m| m.name() == monitor.name()) {
            return Err(ConfigurationError::DuplicateMonitor {
                name: monitor.name().to_string(),
            });
        }
        monitors.push(monitor);
        Ok(())
    }

    /// Removes a monitor and deregisters its triggers. Unknown names are ignored.
    pub fn remove_monitor(&self, name: &str) -> Option<Arc<Monitor>> {
        let removed = {
            let mut monitors = self.write_monitors();
            let pos = monitors.iter().position(|m| m.name() == name)?;
            monitors.remove(pos)
        };

        let ids: HashSet<TriggerId> = removed.triggers().iter().map(|t| t.id()).collect();
        self.write_listeners().retain(|t| !ids.contains(&t.id()));
        info!(monitor = %name, "monitor removed");
        Some(removed)
    }

    /// Removes a trigger from a monitor and from the dispatch list.
    pub fn remove_trigger(&self, monitor: &str, id: TriggerId) -> Option<Arc<Trigger>> {
        let removed = self.find_monitor(monitor)?.remove_trigger(id)?;
        self.write_listeners().retain(|t| t.id() != id);
        Some(removed)
    }

    /// Looks up a monitor by name.
    #[must_use]
    pub fn find_monitor(&self, name: &str) -> Option<Arc<Monitor>> {
        self.read_monitors().iter().find(|m| m.name() == name).cloned()
    }

    /// Registered monitors, in registration order.
    #[must_use]
    pub fn monitors(&self) -> Vec<Arc<Monitor>> {
        self.read_monitors().clone()
    }

    // ---- destinations ------------------------------------------------------

    /// Registers a destination under its own name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateDestination` when the name is taken.
    pub fn add_destination(&self, destination: Arc<dyn MonitorDestination>) -> Result<(), ConfigurationError> {
        let mut destinations = self.destinations.write().unwrap_or_else(PoisonError::into_inner);
        let name = destination.name().to_string();
        if destinations.contains_key(&name) {
            return Err(ConfigurationError::DuplicateDestination { name });
        }
        destinations.insert(name, destination);
        Ok(())
    }

    /// Looks up a destination by name.
    #[must_use]
    pub fn destination(&self, name: &str) -> Option<Arc<dyn MonitorDestination>> {
        self.read_destinations().get(name).cloned()
    }

    /// Registered destination names, sorted.
    #[must_use]
    pub fn destination_names(&self) -> Vec<String> {
        self.read_destinations().keys().cloned().collect()
    }

    pub(crate) fn destinations(&self) -> Vec<Arc<dyn MonitorDestination>> {
        self.read_destinations().values().cloned().collect()
    }

    // ---- lifecycle ---------------------------------------------------------

    /// Configures every destination and monitor and rebuilds the dispatch list.
    ///
    /// Monitors that fail to configure, or that notify a destination that
    /// failed to configure, are left out of dispatch; every failure is logged
    /// and the first one is returned. Calling `configure` again picks up newly
    /// registered monitors and triggers.
    ///
    /// # Errors
    ///
    /// Returns the first destination or monitor configuration error.
    pub fn configure(&self) -> MonitorResult<()> {
        let mut first_err: Option<ConfigurationError> = None;
        let mut failed_destinations = BTreeSet::new();

        for destination in self.destinations() {
            if let Err(err) = destination.configure() {
                error!(destination = %destination.name(), error = %err, "destination configuration failed");
                failed_destinations.insert(destination.name().to_string());
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        let mut listeners = Vec::new();

        for monitor in self.monitors() {
            let broken: Vec<String> = monitor
                .destination_names()
                .into_iter()
                .filter(|name| failed_destinations.contains(name))
                .collect();
            if !broken.is_empty() {
                error!(
                    monitor = %monitor.name(),
                    destinations = ?broken,
                    "monitor left out of dispatch: destination failed to configure"
                );
                continue;
            }

            match monitor.configure(self) {
                Ok(()) => {
                    let triggers = monitor.triggers();
                    self.warn_undeclared_event_codes(&monitor, &triggers);
                    listeners.extend(triggers);
                }
                Err(err) => {
                    error!(monitor = %monitor.name(), error = %err, "monitor configuration failed");
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }

        let trigger_count = listeners.len();
        *self.write_listeners() = listeners;
        info!(
            monitors = self.read_monitors().len(),
            triggers = trigger_count,
            "monitoring configured"
        );

        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn warn_undeclared_event_codes(&self, monitor: &Monitor, triggers: &[Arc<Trigger>]) {
        let registry = self.read_registry();
        for trigger in triggers {
            for code in trigger.event_codes() {
                if !registry.is_registered(code) {
                    warn!(
                        monitor = %monitor.name(),
                        trigger = %trigger.id(),
                        event_code = %code,
                        "event code is not declared by any source"
                    );
                }
            }
        }
    }

    /// Stops dispatch and closes every destination.
    pub fn shutdown(&self) {
        self.set_enabled(false);
        self.write_listeners().clear();
        for destination in self.destinations() {
            destination.close();
        }
        info!("monitoring shut down");
    }

    /// Number of triggers in the dispatch list.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    // ---- events ------------------------------------------------------------

    /// Declares that `source` may throw `event_code`. Bookkeeping only.
    pub fn register_event(&self, source: &dyn EventThrowing, event_code: &str) {
        debug!(
            event_code = %event_code,
            adapter = source.adapter_name().unwrap_or("<none>"),
            source = %source.event_source_name(),
            "event registered"
        );
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(SourceKey::of(source), event_code);
    }

    /// Reports an occurrence now. Returns the number of triggers that invoked
    /// their monitor.
    pub fn fire_event(&self, source: &Arc<dyn EventThrowing>, event_code: &str) -> usize {
        self.dispatch(&MonitorEvent::new(Arc::clone(source), event_code))
    }

    /// Reports an occurrence with a message payload.
    pub fn fire_event_with_message(
        &self,
        source: &Arc<dyn EventThrowing>,
        event_code: &str,
        message: impl Into<String>,
    ) -> usize {
        self.dispatch(&MonitorEvent::new(Arc::clone(source), event_code).with_message(message))
    }

    /// Delivers a prepared event to every listener, in registration order.
    pub fn dispatch(&self, event: &MonitorEvent) -> usize {
        if !self.is_enabled() {
            return 0;
        }

        // Snapshot so no registry lock is held while triggers run.
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();

        listeners
            .iter()
            .filter(|trigger| trigger.on_event(event, self))
            .count()
    }

    pub(crate) fn register_state_change(&self, at: DateTime<Utc>) {
        *self.last_state_change.lock().unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    /// Time of the most recent monitor state change.
    #[must_use]
    pub fn last_state_change(&self) -> Option<DateTime<Utc>> {
        *self.last_state_change.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- introspection -----------------------------------------------------

    /// A copy of the event registry.
    #[must_use]
    pub fn registry(&self) -> EventRegistry {
        self.read_registry().clone()
    }

    /// Every declared event code, sorted.
    #[must_use]
    pub fn event_codes(&self) -> Vec<String> {
        self.read_registry().event_codes()
    }

    /// Event codes declared by any of `sources`.
    #[must_use]
    pub fn event_codes_by_sources(&self, sources: &[SourceKey]) -> Vec<String> {
        self.read_registry().event_codes_by_sources(sources)
    }

    /// Event codes declared inside any of `adapters`.
    #[must_use]
    pub fn event_codes_by_adapters<S: AsRef<str>>(&self, adapters: &[S]) -> Vec<String> {
        self.read_registry().event_codes_by_adapters(adapters)
    }

    /// Sources that declared any of `event_codes`.
    #[must_use]
    pub fn event_sources<S: AsRef<str>>(&self, event_codes: &[S]) -> Vec<SourceKey> {
        self.read_registry().event_sources(event_codes)
    }

    /// Display names of the sources that declared any of `event_codes`, sorted.
    #[must_use]
    pub fn event_source_names_by_event_codes<S: AsRef<str>>(&self, event_codes: &[S]) -> Vec<String> {
        self.read_registry().source_names_by_event_codes(event_codes)
    }

    /// Display names of the declared sources inside `adapters`, sorted.
    #[must_use]
    pub fn event_source_names_by_adapters<S: AsRef<str>>(&self, adapters: &[S]) -> Vec<String> {
        self.read_registry().source_names_by_adapters(adapters)
    }

    /// Adapters with at least one declared source, sorted.
    #[must_use]
    pub fn adapter_names(&self) -> Vec<String> {
        self.read_registry().adapter_names()
    }

    /// Adapters whose sources declared any of `event_codes`, sorted.
    #[must_use]
    pub fn adapter_names_by_event_codes<S: AsRef<str>>(&self, event_codes: &[S]) -> Vec<String> {
        self.read_registry().adapter_names_by_event_codes(event_codes)
    }

    /// Looks up a declared source.
    #[must_use]
    pub fn find_source(&self, adapter: &str, name: &str) -> Option<SourceKey> {
        self.read_registry().find_source(adapter, name)
    }

    /// Status of every monitor, in registration order.
    #[must_use]
    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            hostname: self.hostname.clone(),
            enabled: self.is_enabled(),
            last_state_change: self.last_state_change(),
            timestamp: Utc::now(),
            monitors: self.monitors().iter().map(|m| m.status()).collect(),
        }
    }

    /// Status tree of every monitor as XML.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Xml` if the document cannot be written.
    pub fn status_xml(&self) -> MonitorResult<String> {
        xml::status_xml(&self.status())
    }

    /// Configuration tree (destinations, monitors, triggers) as XML.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Xml` if the document cannot be written.
    pub fn to_xml(&self) -> MonitorResult<String> {
        xml::config_xml(self)
    }
}
