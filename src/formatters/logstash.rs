//! Logstash UDP envelope formatter
//!
//! Produces one JSON object per event, renamed through a field map and tagged
//! with the target index. The serialized document is kept under
//! [`MAX_DATAGRAM_BYTES`] by truncating the message.

use crate::core::{Formatter, LogEvent, LoggerError, Payload, PayloadKind, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Largest document handed to a UDP writer
pub const MAX_DATAGRAM_BYTES: usize = 8 * 1024;

/// Event fields the formatter can emit
pub const SOURCE_FIELDS: &[&str] = &[
    "timestamp",
    "message",
    "level",
    "priority",
    "context",
    "correlation_token",
    "parent_correlation_token",
    "index_name",
    "id",
];

#[derive(Debug, Clone)]
pub struct LogstashFormatter {
    index_name: String,
    /// source field -> output key
    field_map: BTreeMap<String, String>,
    max_bytes: usize,
}

impl LogstashFormatter {
    /// Emit every source field except `id` under its own name
    pub fn new(index_name: impl Into<String>) -> Self {
        let field_map = SOURCE_FIELDS
            .iter()
            .filter(|field| **field != "id")
            .map(|field| (field.to_string(), field.to_string()))
            .collect();

        Self {
            index_name: index_name.into(),
            field_map,
            max_bytes: MAX_DATAGRAM_BYTES,
        }
    }

    /// Replace the field map; only mapped fields are emitted
    pub fn with_field_map(mut self, field_map: BTreeMap<String, String>) -> Result<Self> {
        if let Some(unknown) = field_map
            .keys()
            .find(|key| !SOURCE_FIELDS.contains(&key.as_str()))
        {
            return Err(LoggerError::config(
                "logstash formatter",
                format!("unknown source field '{}'", unknown),
            ));
        }
        self.field_map = field_map;
        Ok(self)
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn source_value(&self, field: &str, event: &LogEvent, message: &str) -> Value {
        match field {
            "timestamp" => Value::String(event.timestamp.to_rfc3339()),
            "message" => Value::String(message.to_string()),
            "level" => Value::String(event.level.to_str().to_string()),
            "priority" => Value::from(event.priority()),
            "context" => event.context.to_json_value(),
            "id" => Value::String(event.id().to_string()),
            "correlation_token" => event
                .correlation_token
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            "parent_correlation_token" => event
                .parent_correlation_token
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
            "index_name" => Value::String(self.index_name.clone()),
            _ => Value::Null,
        }
    }

    fn render(&self, event: &LogEvent, message: &str) -> Value {
        let doc: Map<String, Value> = self
            .field_map
            .iter()
            .map(|(source, key)| (key.clone(), self.source_value(source, event, message)))
            .collect();
        Value::Object(doc)
    }
}

impl Formatter for LogstashFormatter {
    fn format(&self, event: &LogEvent) -> Option<Payload> {
        let mut message = event.message.clone();
        let mut doc = self.render(event, &message);

        loop {
            let size = doc.to_string().len();
            if size <= self.max_bytes || message.is_empty() {
                break;
            }
            // Every removed raw byte shrinks the encoded form by at least one byte
            let mut keep = message.len().saturating_sub(size - self.max_bytes);
            while !message.is_char_boundary(keep) {
                keep -= 1;
            }
            message.truncate(keep);
            doc = self.render(event, &message);
        }

        Some(Payload::Document(doc))
    }

    fn kind(&self) -> PayloadKind {
        PayloadKind::Document
    }

    fn name(&self) -> &str {
        "logstash"
    }
}
