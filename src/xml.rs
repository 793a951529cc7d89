//! XML export of the monitoring configuration and status.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{MonitorError, MonitorResult};
use crate::monitor::{ManagerStatus, MonitorManager};

/// Indented element writer.
struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn open(&mut self, element: BytesStart<'_>) -> MonitorResult<()> {
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> MonitorResult<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, element: BytesStart<'_>) -> MonitorResult<()> {
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> MonitorResult<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> MonitorResult<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|err| MonitorError::internal(format!("non UTF-8 XML output: {err}")))
    }
}

fn element<'a>(name: &'a str, attributes: &[(&str, &str)]) -> BytesStart<'a> {
    let mut element = BytesStart::new(name);
    for attribute in attributes {
        element.push_attribute(*attribute);
    }
    element
}

/// Renders the `<monitoring>` configuration document.
pub(crate) fn config_xml(manager: &MonitorManager) -> MonitorResult<String> {
    let mut xml = XmlBuilder::new();
    let enabled = manager.is_enabled().to_string();
    xml.open(element(
        "monitoring",
        &[("enabled", enabled.as_str()), ("hostname", manager.hostname())],
    ))?;

    xml.open(BytesStart::new("destinations"))?;
    for destination in manager.destinations() {
        xml.empty(element(
            "destination",
            &[("name", destination.name()), ("kind", destination.kind())],
        ))?;
    }
    xml.close("destinations")?;

    xml.open(BytesStart::new("monitors"))?;
    for monitor in manager.monitors() {
        let destinations = monitor.destination_names().join(",");
        xml.open(element(
            "monitor",
            &[
                ("name", monitor.name()),
                ("type", monitor.event_type().as_str()),
                ("destinations", destinations.as_str()),
            ],
        ))?;

        for trigger in monitor.triggers() {
            let tag = if trigger.is_alarm() { "alarm" } else { "clearing" };
            let threshold = trigger.threshold().to_string();
            let period = trigger.period().to_string();
            let filtering = trigger.source_filtering();
            let mut attributes = vec![("severity", trigger.severity().as_str())];
            if trigger.threshold() > 0 {
                attributes.push(("threshold", threshold.as_str()));
                attributes.push(("period", period.as_str()));
            }
            attributes.push(("sourceFiltering", filtering.as_str()));
            xml.open(element(tag, &attributes))?;

            xml.open(BytesStart::new("events"))?;
            for code in trigger.event_codes() {
                xml.text_element("event", code)?;
            }
            xml.close("events")?;

            for filter in trigger.adapter_filters() {
                let adapter = element("adapterfilter", &[("adapter", filter.adapter())]);
                if filter.is_filtering_to_lower_level_objects() {
                    xml.open(adapter)?;
                    xml.open(BytesStart::new("sources"))?;
                    for source in filter.sub_objects() {
                        xml.text_element("source", source)?;
                    }
                    xml.close("sources")?;
                    xml.close("adapterfilter")?;
                } else {
                    xml.empty(adapter)?;
                }
            }
            xml.close(tag)?;
        }
        xml.close("monitor")?;
    }
    xml.close("monitors")?;

    xml.close("monitoring")?;
    xml.finish()
}

/// Renders the `<monitorstatus>` document.
pub(crate) fn status_xml(status: &ManagerStatus) -> MonitorResult<String> {
    let mut xml = XmlBuilder::new();
    let timestamp = status.timestamp.to_rfc3339();
    let last_state_change = status.last_state_change.map(|t| t.to_rfc3339());
    let mut attributes = vec![("hostname", status.hostname.as_str())];
    if let Some(at) = &last_state_change {
        attributes.push(("lastStateChange", at.as_str()));
    }
    attributes.push(("timestamp", timestamp.as_str()));
    xml.open(element("monitorstatus", &attributes))?;

    for monitor in &status.monitors {
        let raised = monitor.raised.to_string();
        let hits = monitor.additional_hit_count.to_string();
        let state_changed = monitor.state_changed.map(|t| t.to_rfc3339());
        let last_hit = monitor.last_hit.map(|t| t.to_rfc3339());
        let source = monitor.raised_by_source.as_ref().map(|s| s.display_name());

        let mut attributes = vec![
            ("name", monitor.name.as_str()),
            ("type", monitor.event_type.as_str()),
            ("raised", raised.as_str()),
        ];
        if let Some(severity) = monitor.alarm_severity {
            attributes.push(("severity", severity.as_str()));
        }
        if let Some(at) = &state_changed {
            attributes.push(("stateChanged", at.as_str()));
        }
        if let Some(at) = &last_hit {
            attributes.push(("lastHit", at.as_str()));
        }
        attributes.push(("additionalHitCount", hits.as_str()));
        if let Some(code) = &monitor.raised_by_event_code {
            attributes.push(("eventCode", code.as_str()));
        }
        if let Some(source) = &source {
            attributes.push(("source", source.as_str()));
        }
        xml.empty(element("monitor", &attributes))?;
    }

    xml.close("monitorstatus")?;
    xml.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::destination::LogDestination;
    use crate::event::EventSource;
    use crate::filter::AdapterFilter;
    use crate::monitor::{Monitor, MonitorManager, Trigger};
    use crate::severity::{EventType, Severity};

    fn manager() -> MonitorManager {
        let manager = MonitorManager::new().with_hostname("node-1");
        manager.add_destination(Arc::new(LogDestination::new("log"))).unwrap();

        let monitor = Monitor::new("queue-down", EventType::Technical);
        monitor.add_destination("log");
        monitor.register_trigger(
            Trigger::alarm(Severity::Critical)
                .with_event_code("QUEUE_DOWN")
                .with_threshold(3, 60)
                .with_adapter_filter(AdapterFilter::new("Orders").with_sub_object("listener")),
        );
        monitor.register_trigger(
            Trigger::clearing(Severity::Critical)
                .with_event_code("QUEUE_UP")
                .with_adapter_filter(AdapterFilter::new("Billing")),
        );
        manager.add_monitor(monitor).unwrap();
        manager.configure().unwrap();
        manager
    }

    #[test]
    fn config_export_lists_destinations_monitors_and_filters() {
        let xml = manager().to_xml().unwrap();
        assert!(xml.starts_with("<monitoring enabled=\"true\" hostname=\"node-1\">"));
        assert!(xml.contains("<destination name=\"log\" kind=\"log\"/>"));
        assert!(xml.contains("<monitor name=\"queue-down\" type=\"TECHNICAL\" destinations=\"log\">"));
        assert!(xml.contains(
            "<alarm severity=\"CRITICAL\" threshold=\"3\" period=\"60\" sourceFiltering=\"SOURCE\">"
        ));
        assert!(xml.contains("<event>QUEUE_DOWN</event>"));
        assert!(xml.contains("<source>listener</source>"));
        assert!(xml.contains("<clearing severity=\"CRITICAL\" sourceFiltering=\"ADAPTER\">"));
        assert!(xml.contains("<adapterfilter adapter=\"Billing\"/>"));
        assert!(xml.trim_end().ends_with("</monitoring>"));
    }

    #[test]
    fn status_export_reflects_raised_monitors() {
        let manager = manager();
        let clear = manager.status_xml().unwrap();
        assert!(clear.contains("raised=\"false\""));
        assert!(!clear.contains("lastStateChange"));

        let source = EventSource::new("Orders", "listener").shared();
        for _ in 0..3 {
            manager.fire_event(&source, "QUEUE_DOWN");
        }
        let raised = manager.status_xml().unwrap();
        assert!(raised.contains("lastStateChange="));
        assert!(raised.contains("raised=\"true\""));
        assert!(raised.contains("severity=\"CRITICAL\""));
        assert!(raised.contains("eventCode=\"QUEUE_DOWN\""));
        assert!(raised.contains("source=\"Orders / listener\""));
    }
}
