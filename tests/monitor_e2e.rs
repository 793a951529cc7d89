use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use pipemon::destination::{ChannelDestination, NotificationStream};
use pipemon::{
    AdapterFilter, DestinationError, EventSource, EventType, Monitor, MonitorDestination, MonitorEvent,
    MonitorManager, Severity, Trigger,
};

fn manager_with_sink() -> (MonitorManager, NotificationStream) {
    let manager = MonitorManager::new();
    let (sink, stream) = ChannelDestination::bounded("sink", 256);
    manager.add_destination(Arc::new(sink)).unwrap();
    (manager, stream)
}

fn kinds(stream: &NotificationStream) -> Vec<(EventType, Severity, String)> {
    stream
        .drain()
        .into_iter()
        .map(|n| (n.event_type, n.severity, n.event_code))
        .collect()
}

#[test]
fn alarm_then_clearing_through_separate_triggers() {
    let (manager, stream) = manager_with_sink();
    let monitor = Monitor::new("M", EventType::Technical);
    monitor.add_destination("sink");
    let t1 = monitor.register_trigger(Trigger::alarm(Severity::Warning).with_event_code("E1"));
    let t2 = monitor.register_trigger(Trigger::clearing(Severity::Warning).with_event_code("E1"));
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    let source = EventSource::new("A", "pipe").shared();

    assert!(t1.on_event(&MonitorEvent::new(Arc::clone(&source), "E1"), &manager));
    assert!(monitor.is_raised());
    assert_eq!(
        kinds(&stream),
        vec![(EventType::Technical, Severity::Warning, "E1".to_string())]
    );

    assert!(t2.on_event(&MonitorEvent::new(Arc::clone(&source), "E1"), &manager));
    assert!(!monitor.is_raised());
    assert_eq!(
        kinds(&stream),
        vec![(EventType::Clearing, Severity::Warning, "E1".to_string())]
    );
}

#[test]
fn shared_event_code_raises_and_clears_in_one_dispatch() {
    let (manager, stream) = manager_with_sink();
    let monitor = Monitor::new("M", EventType::Technical);
    monitor.add_destination("sink");
    monitor.register_trigger(Trigger::alarm(Severity::Warning).with_event_code("E1"));
    monitor.register_trigger(Trigger::clearing(Severity::Warning).with_event_code("E1"));
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    let source = EventSource::new("A", "pipe").shared();
    assert_eq!(manager.fire_event(&source, "E1"), 2);

    // Triggers run in registration order: alarm first, then clearing.
    let sent = kinds(&stream);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, EventType::Technical);
    assert_eq!(sent[1].0, EventType::Clearing);
    assert!(!monitor.is_raised());
}

#[test]
fn threshold_fires_on_third_hit_and_keeps_firing() {
    let (manager, stream) = manager_with_sink();
    let monitor = Monitor::new("M", EventType::Functional);
    monitor.add_destination("sink");
    let trigger =
        monitor.register_trigger(Trigger::alarm(Severity::Critical).with_event_code("E1").with_threshold(3, 60));
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    let source = EventSource::new("A", "pipe").shared();
    let t0 = Utc::now();
    let at = |secs: i64| MonitorEvent::at(Arc::clone(&source), "E1", t0 + ChronoDuration::seconds(secs));

    assert_eq!(manager.dispatch(&at(0)), 0);
    assert_eq!(manager.dispatch(&at(10)), 0);
    assert!(stream.try_recv().is_none());

    assert_eq!(manager.dispatch(&at(20)), 1);
    let sent = stream.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event_type, EventType::Functional);
    assert_eq!(sent[0].severity, Severity::Critical);

    // The window is not reset after firing: the fourth hit reaches the
    // monitor again, which only counts it.
    assert_eq!(manager.dispatch(&at(30)), 1);
    assert_eq!(trigger.window_len(), 4);
    assert_eq!(monitor.additional_hit_count(), 1);
    assert!(stream.try_recv().is_none());
}

#[test]
fn escalation_sends_clearing_before_new_alarm() {
    let (manager, stream) = manager_with_sink();
    let monitor = Monitor::new("M", EventType::Technical);
    monitor.add_destination("sink");
    monitor.register_trigger(Trigger::alarm(Severity::Warning).with_event_code("SLOW"));
    monitor.register_trigger(Trigger::alarm(Severity::Fatal).with_event_code("DOWN"));
    monitor.register_trigger(Trigger::clearing(Severity::Harmless).with_event_code("UP"));
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    let source = EventSource::new("A", "listener").shared();
    manager.fire_event(&source, "SLOW");
    manager.fire_event(&source, "DOWN");
    manager.fire_event(&source, "SLOW");
    // A lower-severity alarm while raised at FATAL is not counted.
    assert_eq!(monitor.additional_hit_count(), 0);
    manager.fire_event(&source, "UP");
    manager.fire_event(&source, "UP");

    assert_eq!(
        kinds(&stream),
        vec![
            (EventType::Technical, Severity::Warning, "SLOW".to_string()),
            (EventType::Clearing, Severity::Warning, "SLOW".to_string()),
            (EventType::Technical, Severity::Fatal, "DOWN".to_string()),
            (EventType::Clearing, Severity::Fatal, "DOWN".to_string()),
        ]
    );
    assert_eq!(monitor.alarm_severity(), Some(Severity::Fatal));
    assert!(!monitor.is_raised());
}

#[test]
fn adapter_filter_scopes_dispatch() {
    let (manager, stream) = manager_with_sink();
    let monitor = Monitor::new("orders", EventType::Technical);
    monitor.add_destination("sink");
    monitor.register_trigger(
        Trigger::alarm(Severity::Warning)
            .with_event_code("E1")
            .with_adapter_filter(AdapterFilter::new("Orders"))
            .with_adapter_filter(AdapterFilter::new("Returns")),
    );
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    let billing = EventSource::new("Billing", "pipe").shared();
    let returns = EventSource::new("Returns", "pipe").shared();
    assert_eq!(manager.fire_event(&billing, "E1"), 0);
    assert!(!monitor.is_raised());

    assert_eq!(manager.fire_event(&returns, "E1"), 1);
    let sent = stream.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].source.display_name(), "Returns / pipe");
}

#[test]
fn opposite_trigger_window_resets_on_state_change() {
    let (manager, stream) = manager_with_sink();
    let monitor = Monitor::new("M", EventType::Technical);
    monitor.add_destination("sink");
    monitor.register_trigger(Trigger::alarm(Severity::Warning).with_event_code("FAIL"));
    let clearing =
        monitor.register_trigger(Trigger::clearing(Severity::Warning).with_event_code("OK").with_threshold(2, 60));
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    let source = EventSource::new("A", "pipe").shared();
    manager.fire_event(&source, "OK");
    assert_eq!(clearing.window_len(), 1);

    manager.fire_event(&source, "FAIL");
    assert_eq!(clearing.window_len(), 0);

    // One OK is no longer enough to clear.
    manager.fire_event(&source, "OK");
    assert!(monitor.is_raised());
    manager.fire_event(&source, "OK");
    assert!(!monitor.is_raised());
    assert_eq!(stream.drain().len(), 2);
}

#[derive(Debug)]
struct FailingDestination {
    calls: Mutex<u32>,
}

impl MonitorDestination for FailingDestination {
    fn name(&self) -> &str {
        "broken"
    }

    fn kind(&self) -> &'static str {
        "test"
    }

    fn fire_event(
        &self,
        _monitor: &str,
        _event_type: EventType,
        _severity: Severity,
        _event_code: &str,
        _event: &MonitorEvent,
    ) -> Result<(), DestinationError> {
        *self.calls.lock().unwrap() += 1;
        Err(DestinationError::SendFailed {
            destination: "broken".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

#[test]
fn failing_destination_does_not_block_others() {
    let (manager, stream) = manager_with_sink();
    let broken = Arc::new(FailingDestination { calls: Mutex::new(0) });
    manager.add_destination(Arc::clone(&broken) as Arc<dyn MonitorDestination>).unwrap();

    let monitor = Monitor::new("M", EventType::Technical);
    // Destinations are notified in name order: "broken" before "sink".
    monitor.set_destinations(["sink", "broken"]);
    monitor.register_trigger(Trigger::alarm(Severity::Critical).with_event_code("E1"));
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    let source = EventSource::new("A", "pipe").shared();
    assert_eq!(manager.fire_event(&source, "E1"), 1);

    assert_eq!(*broken.calls.lock().unwrap(), 1);
    assert!(monitor.is_raised());
    let n = stream.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(n.severity, Severity::Critical);
}

#[test]
fn removed_monitor_no_longer_receives_events() {
    let (manager, stream) = manager_with_sink();
    let monitor = Monitor::new("M", EventType::Technical);
    monitor.add_destination("sink");
    monitor.register_trigger(Trigger::alarm(Severity::Warning).with_event_code("E1"));
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    let removed = manager.remove_monitor("M").unwrap();
    assert_eq!(removed.name(), "M");
    assert!(manager.find_monitor("M").is_none());

    let source = EventSource::new("A", "pipe").shared();
    assert_eq!(manager.fire_event(&source, "E1"), 0);
    assert!(stream.try_recv().is_none());
    assert!(!monitor.is_raised());
}

#[test]
fn triggers_added_after_configure_need_reconfigure() {
    let (manager, stream) = manager_with_sink();
    let monitor = Monitor::new("M", EventType::Technical);
    monitor.add_destination("sink");
    manager.add_monitor(Arc::clone(&monitor)).unwrap();
    manager.configure().unwrap();

    monitor.register_trigger(Trigger::alarm(Severity::Warning).with_event_code("E1"));
    let source = EventSource::new("A", "pipe").shared();
    assert_eq!(manager.fire_event(&source, "E1"), 0);

    manager.configure().unwrap();
    assert_eq!(manager.fire_event(&source, "E1"), 1);
    assert_eq!(stream.drain().len(), 1);
}

#[test]
fn registry_queries_reflect_declared_sources() {
    let manager = MonitorManager::new();
    let listener = EventSource::new("Orders", "listener");
    let validator = EventSource::new("Orders", "validator");
    let sender = EventSource::new("Billing", "sender");
    manager.register_event(&listener, "QUEUE_DOWN");
    manager.register_event(&validator, "INVALID");
    manager.register_event(&sender, "QUEUE_DOWN");

    assert_eq!(manager.event_codes(), vec!["INVALID", "QUEUE_DOWN"]);
    assert_eq!(manager.adapter_names(), vec!["Billing", "Orders"]);
    assert_eq!(manager.adapter_names_by_event_codes(&["INVALID"]), vec!["Orders"]);
    assert_eq!(
        manager.event_source_names_by_event_codes(&["QUEUE_DOWN"]),
        vec!["Billing / sender", "Orders / listener"]
    );
    assert_eq!(manager.event_codes_by_adapters(&["Orders"]), vec!["QUEUE_DOWN", "INVALID"]);
    assert!(manager.find_source("Billing", "sender").is_some());
}
