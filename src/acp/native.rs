//! Native dialect: the agent already speaks the canonical event schema.
//! A line must parse as a JSON object carrying a non-empty string `event`
//! field matching one of the canonical event names; any deviation emits an
//! `error` instead of propagating a malformed value. Valid lines are
//! deserialized straight into [`AcpEvent`] -- "yielded as-is" per the spec,
//! since the wire shape already is the canonical shape.

use super::{malformed_line_error, AcpEvent, DialectAdapter};
use serde_json::Value;

#[derive(Default)]
pub struct NativeAdapter;

impl NativeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DialectAdapter for NativeAdapter {
    fn process_line(&mut self, line: &str) -> Vec<AcpEvent> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => return vec![malformed_line_error(line, err)],
        };

        let has_event_name = raw.get("event").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
        if !raw.is_object() || !has_event_name {
            return vec![malformed_line_error(line, "missing or empty \"event\" field")];
        }

        match serde_json::from_value::<AcpEvent>(raw) {
            Ok(event) => vec![event],
            Err(err) => vec![malformed_line_error(line, err)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_event_passes_through() {
        let mut adapter = NativeAdapter::new();
        let events = adapter.process_line(r#"{"event":"agent_message","text":"hi"}"#);
        assert_eq!(events, vec![AcpEvent::AgentMessage { text: "hi".to_string() }]);
    }

    #[test]
    fn missing_event_field_is_an_error() {
        let mut adapter = NativeAdapter::new();
        let events = adapter.process_line(r#"{"text":"hi"}"#);
        assert!(matches!(&events[0], AcpEvent::Error { .. }));
    }

    #[test]
    fn unparseable_json_is_an_error() {
        let mut adapter = NativeAdapter::new();
        let events = adapter.process_line("not json at all");
        assert!(matches!(&events[0], AcpEvent::Error { .. }));
    }

    #[test]
    fn unknown_event_name_is_an_error() {
        let mut adapter = NativeAdapter::new();
        let events = adapter.process_line(r#"{"event":"not_a_real_event"}"#);
        assert!(matches!(&events[0], AcpEvent::Error { .. }));
    }
}
