//! Formatter trait and serialized payload shapes

use super::log_event::LogEvent;
use serde::{Deserialize, Serialize};

/// One numeric observation extracted from an event
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub metric_id: String,
    pub value: f64,
    /// Event timestamp, epoch seconds
    pub timestamp: i64,
}

/// Serialized form of an event handed to a writer
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Single human-readable line
    Line(String),
    /// Structured document (JSON object)
    Document(serde_json::Value),
    /// Numeric observation
    Metric(MetricSample),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Line,
    Document,
    Metric,
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Line(_) => PayloadKind::Line,
            Payload::Document(_) => PayloadKind::Document,
            Payload::Metric(_) => PayloadKind::Metric,
        }
    }

    /// Wire text of the payload
    pub fn to_text(&self) -> String {
        match self {
            Payload::Line(line) => line.clone(),
            Payload::Document(doc) => doc.to_string(),
            Payload::Metric(sample) => format!("{} {}", sample.metric_id, sample.value),
        }
    }
}

/// Pure transform from event to payload
///
/// Returning `None` drops the event for this writer; it is a skip, not an error.
pub trait Formatter: Send + Sync {
    fn format(&self, event: &LogEvent) -> Option<Payload>;
    fn kind(&self) -> PayloadKind;
    fn name(&self) -> &str;
}
