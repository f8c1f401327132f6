//! Human-readable single-line formatter

use crate::core::{Formatter, LogEvent, Payload, PayloadKind, TimestampFormat};
#[cfg(feature = "console")]
use colored::Colorize;

/// Formats events as `[timestamp] [level] message key=value ...`
#[derive(Debug, Clone, Default)]
pub struct LineFormatter {
    timestamp_format: TimestampFormat,
    use_colors: bool,
    include_id: bool,
}

impl LineFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Colorize the level (only with the `console` feature)
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    #[must_use]
    pub fn with_id(mut self, include_id: bool) -> Self {
        self.include_id = include_id;
        self
    }

    #[cfg(feature = "console")]
    fn level_text(&self, event: &LogEvent) -> String {
        let padded = format!("{:9}", event.level.to_str().to_uppercase());
        if self.use_colors {
            padded.color(event.level.color_code()).to_string()
        } else {
            padded
        }
    }

    #[cfg(not(feature = "console"))]
    fn level_text(&self, event: &LogEvent) -> String {
        format!("{:9}", event.level.to_str().to_uppercase())
    }

    /// Escape line breaks so one event is always one line
    fn sanitize(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }
}

impl Formatter for LineFormatter {
    fn format(&self, event: &LogEvent) -> Option<Payload> {
        let mut line = format!(
            "[{}] [{}]",
            self.timestamp_format.format(&event.timestamp),
            self.level_text(event)
        );
        if self.include_id && !event.id().is_empty() {
            line.push_str(&format!(" ({})", event.id()));
        }
        line.push(' ');
        line.push_str(&Self::sanitize(&event.message));

        if !event.context.is_empty() {
            line.push(' ');
            line.push_str(&Self::sanitize(&event.context.format_fields()));
        }
        Some(Payload::Line(line))
    }

    fn kind(&self) -> PayloadKind {
        PayloadKind::Line
    }

    fn name(&self) -> &str {
        "line"
    }
}
