//! Declared event sources.
//!
//! Pipeline components declare at configure time which event codes they may
//! throw. The registry is pure bookkeeping for consoles and configuration
//! checks; it has no influence on dispatch.

use std::collections::BTreeMap;

use crate::event::SourceKey;

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn sorted_unique(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items
}

/// Index of which sources may throw which event codes.
#[derive(Debug, Default, Clone)]
pub struct EventRegistry {
    events_by_source: BTreeMap<SourceKey, Vec<String>>,
    sources_by_event: BTreeMap<String, Vec<SourceKey>>,
    events_by_adapter: BTreeMap<String, Vec<String>>,
    sources_by_adapter: BTreeMap<String, Vec<SourceKey>>,
}

impl EventRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `source` may throw `event_code`. Idempotent.
    pub fn register(&mut self, source: SourceKey, event_code: &str) {
        push_unique(
            self.events_by_source.entry(source.clone()).or_default(),
            event_code.to_string(),
        );
        push_unique(
            self.sources_by_event.entry(event_code.to_string()).or_default(),
            source.clone(),
        );
        if let Some(adapter) = source.adapter.clone() {
            push_unique(
                self.events_by_adapter.entry(adapter.clone()).or_default(),
                event_code.to_string(),
            );
            push_unique(self.sources_by_adapter.entry(adapter).or_default(), source);
        }
    }

    /// True when at least one source declared `event_code`.
    #[must_use]
    pub fn is_registered(&self, event_code: &str) -> bool {
        self.sources_by_event.contains_key(event_code)
    }

    /// Every declared event code, sorted.
    #[must_use]
    pub fn event_codes(&self) -> Vec<String> {
        self.sources_by_event.keys().cloned().collect()
    }

    /// Every declared source, ordered by adapter then source name.
    #[must_use]
    pub fn sources(&self) -> Vec<SourceKey> {
        self.events_by_source.keys().cloned().collect()
    }

    /// Event codes thrown by at least one of `sources`, in first-seen order.
    #[must_use]
    pub fn event_codes_by_sources(&self, sources: &[SourceKey]) -> Vec<String> {
        let mut out = Vec::new();
        for source in sources {
            for code in self.events_by_source.get(source).into_iter().flatten() {
                push_unique(&mut out, code.clone());
            }
        }
        out
    }

    /// Event codes thrown inside at least one of `adapters`, in first-seen order.
    #[must_use]
    pub fn event_codes_by_adapters<S: AsRef<str>>(&self, adapters: &[S]) -> Vec<String> {
        let mut out = Vec::new();
        for adapter in adapters {
            for code in self.events_by_adapter.get(adapter.as_ref()).into_iter().flatten() {
                push_unique(&mut out, code.clone());
            }
        }
        out
    }

    /// Sources able to throw at least one of `event_codes`.
    #[must_use]
    pub fn event_sources<S: AsRef<str>>(&self, event_codes: &[S]) -> Vec<SourceKey> {
        self.events_by_source
            .iter()
            .filter(|(_, codes)| {
                event_codes
                    .iter()
                    .any(|wanted| codes.iter().any(|code| code == wanted.as_ref()))
            })
            .map(|(source, _)| source.clone())
            .collect()
    }

    /// Display names of the sources able to throw one of `event_codes`, sorted.
    #[must_use]
    pub fn source_names_by_event_codes<S: AsRef<str>>(&self, event_codes: &[S]) -> Vec<String> {
        sorted_unique(
            self.event_sources(event_codes)
                .iter()
                .map(SourceKey::display_name)
                .collect(),
        )
    }

    /// Display names of the sources inside `adapters`, sorted.
    #[must_use]
    pub fn source_names_by_adapters<S: AsRef<str>>(&self, adapters: &[S]) -> Vec<String> {
        let names = adapters
            .iter()
            .filter_map(|adapter| self.sources_by_adapter.get(adapter.as_ref()))
            .flatten()
            .map(SourceKey::display_name)
            .collect();
        sorted_unique(names)
    }

    /// Names of every adapter with declared sources, sorted.
    #[must_use]
    pub fn adapter_names(&self) -> Vec<String> {
        self.events_by_adapter.keys().cloned().collect()
    }

    /// Names of the adapters whose sources throw one of `event_codes`, sorted.
    #[must_use]
    pub fn adapter_names_by_event_codes<S: AsRef<str>>(&self, event_codes: &[S]) -> Vec<String> {
        let names = event_codes
            .iter()
            .filter_map(|code| self.sources_by_event.get(code.as_ref()))
            .flatten()
            .filter_map(|source| source.adapter.clone())
            .collect();
        sorted_unique(names)
    }

    /// Looks up a declared source by adapter and name.
    #[must_use]
    pub fn find_source(&self, adapter: &str, name: &str) -> Option<SourceKey> {
        self.sources_by_adapter
            .get(adapter)?
            .iter()
            .find(|source| source.source == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;

    fn key(adapter: &str, source: &str) -> SourceKey {
        SourceKey::of(&EventSource::new(adapter, source))
    }

    fn registry() -> EventRegistry {
        let mut reg = EventRegistry::new();
        reg.register(key("Orders", "receiver"), "RECEIVE_FAILED");
        reg.register(key("Orders", "validate"), "INVALID_MESSAGE");
        reg.register(key("Orders", "validate"), "RECEIVE_FAILED");
        reg.register(key("Billing", "sender"), "SEND_FAILED");
        reg.register(SourceKey::of(&EventSource::standalone("scheduler")), "JOB_FAILED");
        // Re-registration is a no-op.
        reg.register(key("Orders", "receiver"), "RECEIVE_FAILED");
        reg
    }

    #[test]
    fn event_codes_are_listed_once() {
        let reg = registry();
        assert_eq!(
            reg.event_codes(),
            vec!["INVALID_MESSAGE", "JOB_FAILED", "RECEIVE_FAILED", "SEND_FAILED"]
        );
        assert!(reg.is_registered("SEND_FAILED"));
        assert!(!reg.is_registered("UNKNOWN"));
    }

    #[test]
    fn codes_by_sources_and_adapters() {
        let reg = registry();
        assert_eq!(
            reg.event_codes_by_sources(&[key("Orders", "validate"), key("Orders", "receiver")]),
            vec!["INVALID_MESSAGE", "RECEIVE_FAILED"]
        );
        assert_eq!(
            reg.event_codes_by_adapters(&["Billing", "Nope"]),
            vec!["SEND_FAILED"]
        );
    }

    #[test]
    fn sources_by_event_codes() {
        let reg = registry();
        assert_eq!(
            reg.event_sources(&["RECEIVE_FAILED"]),
            vec![key("Orders", "receiver"), key("Orders", "validate")]
        );
        let empty: [&str; 0] = [];
        assert!(reg.event_sources(&empty).is_empty());
        assert_eq!(
            reg.source_names_by_event_codes(&["RECEIVE_FAILED", "JOB_FAILED"]),
            vec![" / scheduler", "Orders / receiver", "Orders / validate"]
        );
    }

    #[test]
    fn adapter_lookups() {
        let reg = registry();
        assert_eq!(reg.adapter_names(), vec!["Billing", "Orders"]);
        assert_eq!(
            reg.adapter_names_by_event_codes(&["RECEIVE_FAILED", "SEND_FAILED", "JOB_FAILED"]),
            vec!["Billing", "Orders"]
        );
        assert_eq!(
            reg.source_names_by_adapters(&["Orders"]),
            vec!["Orders / receiver", "Orders / validate"]
        );
        assert_eq!(reg.find_source("Orders", "validate"), Some(key("Orders", "validate")));
        assert_eq!(reg.find_source("Orders", "missing"), None);
    }
}
