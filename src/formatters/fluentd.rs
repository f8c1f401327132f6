//! JSON-lines formatter with a fixed field set

use crate::core::{Formatter, LogEvent, Payload, PayloadKind};
use serde_json::{Map, Value};

/// Renders each event as one JSON object with stable keys:
/// `timestamp`, `message`, `level`, `priority`, `context`,
/// `correlation_token`, `parent_correlation_token` and `index_name`.
///
/// Absent tokens and an unset index are emitted as `null` so the key set
/// never changes.
#[derive(Debug, Clone, Default)]
pub struct FluentdFormatter {
    index_name: Option<String>,
}

impl FluentdFormatter {
    pub fn new() -> Self {
        Self { index_name: None }
    }

    #[must_use]
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    fn document(&self, event: &LogEvent) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert("timestamp".into(), Value::String(event.timestamp.to_rfc3339()));
        doc.insert("message".into(), Value::String(event.message.clone()));
        doc.insert("level".into(), Value::String(event.level.to_str().to_string()));
        doc.insert("priority".into(), Value::from(event.priority()));
        doc.insert("context".into(), event.context.to_json_value());
        doc.insert("correlation_token".into(), optional(&event.correlation_token));
        doc.insert(
            "parent_correlation_token".into(),
            optional(&event.parent_correlation_token),
        );
        doc.insert("index_name".into(), optional(&self.index_name));
        doc
    }
}

fn optional(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

impl Formatter for FluentdFormatter {
    fn format(&self, event: &LogEvent) -> Option<Payload> {
        Some(Payload::Document(Value::Object(self.document(event))))
    }

    fn kind(&self) -> PayloadKind {
        PayloadKind::Document
    }

    fn name(&self) -> &str {
        "fluentd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogContext, LogLevel};

    #[test]
    fn test_fixed_keys() {
        let mut event = LogEvent::new(
            LogLevel::Error,
            "db down",
            LogContext::new().with_field("attempt", 3),
        );
        event.correlation_token = Some("ABC".to_string());

        let payload = FluentdFormatter::new().format(&event).unwrap();
        let Payload::Document(doc) = payload else {
            panic!("expected a document");
        };

        assert_eq!(doc["message"], "db down");
        assert_eq!(doc["level"], "error");
        assert_eq!(doc["priority"], 3);
        assert_eq!(doc["context"]["attempt"], 3);
        assert_eq!(doc["correlation_token"], "ABC");
        assert!(doc["parent_correlation_token"].is_null());
        assert!(doc["index_name"].is_null());

        let mut keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "context",
                "correlation_token",
                "index_name",
                "level",
                "message",
                "parent_correlation_token",
                "priority",
                "timestamp",
            ]
        );
    }

    #[test]
    fn test_index_name() {
        let event = LogEvent::new(LogLevel::Info, "hello", LogContext::new());
        let formatter = FluentdFormatter::new().with_index_name("app-logs");
        let Payload::Document(doc) = formatter.format(&event).unwrap() else {
            panic!("expected a document");
        };
        assert_eq!(doc["index_name"], "app-logs");
    }

    #[test]
    fn test_payload_is_one_line() {
        let event = LogEvent::new(LogLevel::Info, "multi\nline", LogContext::new());
        let text = FluentdFormatter::new().format(&event).unwrap().to_text();
        assert!(!text.contains('\n'));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["message"], "multi\nline");
    }
}
