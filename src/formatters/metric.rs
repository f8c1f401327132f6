//! Metric extraction formatter

use crate::core::{Formatter, LogEvent, MetricSample, Payload, PayloadKind};

pub const METRIC_ID_KEY: &str = "metricId";
pub const VALUE_KEY: &str = "value";

/// Pulls `(metricId, value)` out of the event context
///
/// Events without a numeric `value` or a `metricId` usable as a metric name
/// (`[a-zA-Z_:][a-zA-Z0-9_:]*`) are skipped.
#[derive(Debug, Clone)]
pub struct MetricFormatter {
    id_key: String,
    value_key: String,
}

impl MetricFormatter {
    pub fn new() -> Self {
        Self {
            id_key: METRIC_ID_KEY.to_string(),
            value_key: VALUE_KEY.to_string(),
        }
    }

    /// Read the pair from other context keys
    pub fn with_keys(id_key: impl Into<String>, value_key: impl Into<String>) -> Self {
        Self {
            id_key: id_key.into(),
            value_key: value_key.into(),
        }
    }

    pub fn sample(&self, event: &LogEvent) -> Option<MetricSample> {
        let metric_id = event
            .context
            .get(&self.id_key)
            .and_then(|v| v.interpolation_text())
            .map(|id| id.trim().to_string())
            .filter(|id| is_metric_name(id))?;
        let value = event.context.get(&self.value_key)?.as_f64()?;

        Some(MetricSample {
            metric_id,
            value,
            timestamp: event.unix_timestamp(),
        })
    }
}

/// Whether `name` is a legal metric name
pub fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    }
}

impl Default for MetricFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for MetricFormatter {
    fn format(&self, event: &LogEvent) -> Option<Payload> {
        self.sample(event).map(Payload::Metric)
    }

    fn kind(&self) -> PayloadKind {
        PayloadKind::Metric
    }

    fn name(&self) -> &str {
        "metric"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogContext, LogLevel};

    fn event(context: LogContext) -> LogEvent {
        LogEvent::new(LogLevel::Warning, "METRICS", context)
    }

    #[test]
    fn test_extracts_sample() {
        let e = event(
            LogContext::new()
                .with_field("metricId", "orders_processed")
                .with_field("value", 17),
        );
        let sample = MetricFormatter::new().sample(&e).unwrap();
        assert_eq!(sample.metric_id, "orders_processed");
        assert_eq!(sample.value, 17.0);
        assert_eq!(sample.timestamp, e.unix_timestamp());
    }

    #[test]
    fn test_numeric_string_value() {
        let e = event(
            LogContext::new()
                .with_field("metricId", "latency")
                .with_field("value", "0.25"),
        );
        assert_eq!(MetricFormatter::new().sample(&e).unwrap().value, 0.25);
    }

    #[test]
    fn test_missing_fields_skip() {
        let formatter = MetricFormatter::new();
        assert!(formatter
            .format(&event(LogContext::new().with_field("value", 1)))
            .is_none());
        assert!(formatter
            .format(&event(LogContext::new().with_field("metricId", "x")))
            .is_none());
        assert!(formatter
            .format(&event(
                LogContext::new()
                    .with_field("metricId", "  ")
                    .with_field("value", 1)
            ))
            .is_none());
        assert!(formatter
            .format(&event(
                LogContext::new()
                    .with_field("metricId", "x")
                    .with_field("value", "lots")
            ))
            .is_none());
    }

    #[test]
    fn test_invalid_metric_name_skips() {
        let formatter = MetricFormatter::new();
        for name in ["bad name", "9lives", "cpu-load", "é"] {
            let e = event(
                LogContext::new()
                    .with_field("metricId", name)
                    .with_field("value", 1),
            );
            assert!(formatter.format(&e).is_none(), "{name} should be skipped");
        }
        assert!(is_metric_name("http:requests_total"));
        assert!(is_metric_name("_internal"));
    }

    #[test]
    fn test_custom_keys() {
        let e = event(LogContext::new().with_field("name", "q").with_field("n", 2.5));
        let sample = MetricFormatter::with_keys("name", "n").sample(&e).unwrap();
        assert_eq!(sample.metric_id, "q");
    }
}
