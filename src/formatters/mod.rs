//! Formatter implementations

pub mod fluentd;
pub mod line;
pub mod logstash;
pub mod metric;
pub mod slack;

pub use fluentd::FluentdFormatter;
pub use line::LineFormatter;
pub use logstash::LogstashFormatter;
pub use metric::MetricFormatter;
pub use slack::SlackFormatter;

pub use crate::core::Formatter;
