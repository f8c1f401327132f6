//! Chat message formatter

use crate::core::{Formatter, LogEvent, Payload, PayloadKind};

/// Slack rejects longer `text` fields in `chat.postMessage`
pub const DEFAULT_MAX_CHARS: usize = 3000;

const ELLIPSIS: char = '…';

/// Renders `*LEVEL* message` followed by a context block, escaped for Slack
/// mrkdwn and truncated to the API's text limit.
#[derive(Debug, Clone)]
pub struct SlackFormatter {
    max_chars: usize,
    include_context: bool,
}

impl SlackFormatter {
    pub fn new() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            include_context: true,
        }
    }

    #[must_use]
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    #[must_use]
    pub fn with_context(mut self, include_context: bool) -> Self {
        self.include_context = include_context;
        self
    }
}

impl Default for SlackFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape the three characters Slack treats as control sequences
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut truncated: String = text.chars().take(max_chars - 1).collect();
    truncated.push(ELLIPSIS);
    truncated
}

impl Formatter for SlackFormatter {
    fn format(&self, event: &LogEvent) -> Option<Payload> {
        let mut text = format!(
            "*{}* {}",
            event.level.to_str().to_uppercase(),
            escape(&event.message)
        );
        if self.include_context && !event.context.is_empty() {
            text.push_str("\n```");
            text.push_str(&escape(&event.context.format_fields()));
            text.push_str("```");
        }
        if let Some(token) = &event.correlation_token {
            text.push_str(&format!("\n_token: {}_", escape(token)));
        }
        Some(Payload::Line(truncate_chars(text, self.max_chars)))
    }

    fn kind(&self) -> PayloadKind {
        PayloadKind::Line
    }

    fn name(&self) -> &str {
        "slack"
    }
}
