//! Log event structure
//!
//! A `LogEvent` is created once per logging call, enriched by the processor
//! chain and then only read by filters, formatters and writers.

use super::log_context::LogContext;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    /// Unique event id, assigned by the id processor
    pub id: Option<String>,
    /// Id seed: embedded numeric id, parsed date or capture time
    pub seed: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Message after placeholder interpolation
    pub message: String,
    pub context: LogContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_correlation_token: Option<String>,
}

impl LogEvent {
    /// Build an event, resolving `{key}` placeholders from `context`
    pub fn new(level: LogLevel, raw_message: &str, context: LogContext) -> Self {
        Self {
            id: None,
            seed: None,
            timestamp: Utc::now(),
            level,
            message: context.interpolate(raw_message),
            context,
            correlation_token: None,
            parent_correlation_token: None,
        }
    }

    #[inline]
    pub fn priority(&self) -> u8 {
        self.level.priority()
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Unix epoch seconds of the event timestamp
    pub fn unix_timestamp(&self) -> i64 {
        self.timestamp.timestamp()
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_interpolates_message() {
        let ctx = LogContext::new().with_field("u", "bob");
        let event = LogEvent::new(LogLevel::Info, "user {u} logged in", ctx);

        assert_eq!(event.message, "user bob logged in");
        assert_eq!(event.priority(), 6);
        assert_eq!(event.id(), "");
        assert!(event.seed.is_none());
    }

    #[test]
    fn test_event_timestamp_resolves_to_epoch() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let event = LogEvent::new(LogLevel::Debug, "x", LogContext::new()).with_timestamp(ts);
        assert_eq!(event.unix_timestamp(), 1_700_000_000);
    }
}
