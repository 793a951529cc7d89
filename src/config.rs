//! Monitoring configuration loading from file and environment variables.
//!
//! ```toml
//! enabled = true
//!
//! [logging]
//! level = "info"
//!
//! [[destinations]]
//! name = "log"
//! kind = "log"
//!
//! [[monitors]]
//! name = "queue-down"
//! type = "TECHNICAL"
//! destinations = ["log"]
//!
//! [[monitors.triggers]]
//! type = "ALARM"
//! severity = "CRITICAL"
//! threshold = 3
//! period = 60
//! event_codes = ["QUEUE_DOWN"]
//! adapter_filters = [{ adapter = "Orders", sources = ["listener"] }]
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::destination::LogDestination;
use crate::error::MonitorError;
use crate::filter::AdapterFilter;
use crate::monitor::{Monitor, MonitorManager, Trigger, TriggerType};
use crate::severity::{EventType, Severity};

/// Top-level monitoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Whether events are dispatched at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Host name reported in exports; defaults to the local host name.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Destinations created from configuration.
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,

    /// Monitors with their triggers.
    #[serde(default)]
    pub monitors: Vec<MonitorConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "pipemon=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Destination types that can be built from configuration alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// [`LogDestination`].
    Log,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub name: String,
    #[serde(default = "default_destination_kind")]
    pub kind: DestinationKind,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_event_type")]
    pub event_type: EventType,
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub severity: Severity,
    #[serde(default)]
    pub threshold: u32,
    #[serde(default)]
    pub period: u32,
    #[serde(default)]
    pub event_codes: Vec<String>,
    #[serde(default)]
    pub adapter_filters: Vec<AdapterFilterConfig>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterFilterConfig {
    pub adapter: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_destination_kind() -> DestinationKind {
    DestinationKind::Log
}

fn default_event_type() -> EventType {
    EventType::Technical
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            hostname: None,
            logging: LoggingConfig::default(),
            destinations: Vec::new(),
            monitors: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration describes an invalid monitor setup.
    #[error("invalid monitoring setup: {0}")]
    Build(#[from] MonitorError),
}

impl TriggerConfig {
    /// Builds the trigger described by this entry.
    #[must_use]
    pub fn to_trigger(&self) -> Trigger {
        let mut trigger = Trigger::new(self.trigger_type, self.severity)
            .with_event_codes(self.event_codes.iter().cloned());
        if self.threshold > 0 {
            trigger = trigger.with_threshold(self.threshold, self.period);
        }
        for filter in &self.adapter_filters {
            let adapter_filter = filter
                .sources
                .iter()
                .fold(AdapterFilter::new(filter.adapter.clone()), |f, source| {
                    f.with_sub_object(source.clone())
                });
            trigger = trigger.with_adapter_filter(adapter_filter);
        }
        trigger
    }
}

impl MonitorConfig {
    /// Builds the monitor and attaches its triggers.
    #[must_use]
    pub fn to_monitor(&self) -> Arc<Monitor> {
        let monitor = Monitor::new(self.name.clone(), self.event_type);
        monitor.set_destinations(self.destinations.iter().cloned());
        for trigger in &self.triggers {
            monitor.register_trigger(trigger.to_trigger());
        }
        monitor
    }
}

impl MonitoringConfig {
    /// Registers the configured destinations and monitors on `manager` and
    /// applies the `enabled` flag. Does not call `configure`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Build` on duplicate destination or monitor names.
    pub fn apply(&self, manager: &MonitorManager) -> Result<(), ConfigError> {
        manager.set_enabled(self.enabled);

        for destination in &self.destinations {
            match destination.kind {
                DestinationKind::Log => manager
                    .add_destination(Arc::new(LogDestination::new(destination.name.clone())))
                    .map_err(MonitorError::from)?,
            }
        }

        for monitor in &self.monitors {
            manager.add_monitor(monitor.to_monitor()).map_err(MonitorError::from)?;
        }

        tracing::info!(
            destinations = self.destinations.len(),
            monitors = self.monitors.len(),
            enabled = self.enabled,
            "monitoring configuration applied"
        );
        Ok(())
    }

    /// Creates a manager from this configuration.
    ///
    /// Destinations that need an external sender can still be added before
    /// calling `configure` on the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Build` on duplicate destination or monitor names.
    pub fn build_manager(&self) -> Result<MonitorManager, ConfigError> {
        let mut manager = MonitorManager::new();
        if let Some(hostname) = &self.hostname {
            manager = manager.with_hostname(hostname.clone());
        }
        self.apply(&manager)?;
        Ok(manager)
    }

    /// Applies environment overrides read through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(enabled) = var("PIPEMON_ENABLED") {
            if let Ok(parsed) = enabled.parse() {
                self.enabled = parsed;
            }
        }
        if let Some(hostname) = var("PIPEMON_HOSTNAME") {
            self.hostname = Some(hostname);
        }
        if let Some(level) = var("PIPEMON_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("PIPEMON_LOG_JSON") {
            self.logging.json = json == "true" || json == "1";
        }
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PIPEMON_ENABLED` overrides `enabled` ("true" or "false")
/// - `PIPEMON_HOSTNAME` overrides `hostname`
/// - `PIPEMON_LOG_LEVEL` overrides `logging.level`
/// - `PIPEMON_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<MonitoringConfig, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                MonitoringConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => MonitoringConfig::default(),
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
