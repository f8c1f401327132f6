//! Regular expression filter

use crate::core::{Filter, LogEvent, Result};
use regex::{Regex, RegexBuilder};

/// Which part of the event the pattern is matched against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexTarget {
    Message,
    /// String form of a context field; events without the field never match
    Field(String),
}

/// Passes events whose message (or chosen field) matches the pattern, or
/// with `negated`, events that do not match it.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    regex: Regex,
    target: RegexTarget,
    negated: bool,
}

impl RegexFilter {
    /// Compile a pattern; `/.../flags` delimiters are accepted (`i`, `m`, `s`, `x`)
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: compile(pattern)?,
            target: RegexTarget::Message,
            negated: false,
        })
    }

    /// Pass only events that do NOT match
    pub fn not_matching(pattern: &str) -> Result<Self> {
        Ok(Self::new(pattern)?.negated(true))
    }

    #[must_use]
    pub fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    #[must_use]
    pub fn on_field(mut self, key: impl Into<String>) -> Self {
        self.target = RegexTarget::Field(key.into());
        self
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    fn is_match(&self, event: &LogEvent) -> bool {
        match &self.target {
            RegexTarget::Message => self.regex.is_match(&event.message),
            RegexTarget::Field(key) => event
                .context
                .get(key)
                .and_then(|v| v.interpolation_text())
                .is_some_and(|text| self.regex.is_match(&text)),
        }
    }
}

impl Filter for RegexFilter {
    fn accept(&self, event: &LogEvent) -> bool {
        self.is_match(event) != self.negated
    }

    fn name(&self) -> &str {
        "regex"
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    let (body, flags) = strip_delimiters(pattern);
    let mut builder = RegexBuilder::new(body);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            _ => builder.ignore_whitespace(true),
        };
    }
    Ok(builder.build()?)
}

/// Flags understood after a closing delimiter
const FLAGS: &str = "imsx";

/// Split `/body/flags` into `(body, flags)`; other strings pass through
///
/// A trailing segment counts as flags only when every character is one of
/// [`FLAGS`], so a bare path such as `/api/users` stays a literal pattern.
fn strip_delimiters(pattern: &str) -> (&str, &str) {
    if pattern.len() >= 2 && pattern.starts_with('/') {
        if let Some(end) = pattern.rfind('/') {
            if end > 0 {
                let flags = &pattern[end + 1..];
                if flags.chars().all(|c| FLAGS.contains(c)) {
                    return (&pattern[1..end], flags);
                }
            }
        }
    }
    (pattern, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogContext, LogLevel};

    fn event(message: &str) -> LogEvent {
        LogEvent::new(LogLevel::Warning, message, LogContext::new())
    }

    #[test]
    fn test_exact_tag_match() {
        let filter = RegexFilter::new("/^METRICS$/").unwrap();
        assert!(filter.accept(&event("METRICS")));
        assert!(!filter.accept(&event("METRICS_GAUGE")));
        assert!(!filter.accept(&event("user logged in")));
    }

    #[test]
    fn test_negated_match() {
        let filter = RegexFilter::not_matching("METRICS").unwrap();
        assert!(filter.accept(&event("user logged in")));
        assert!(!filter.accept(&event("METRICS_COUNTER")));
    }

    #[test]
    fn test_prefix_and_flags() {
        let filter = RegexFilter::new("/^sms_alert/i").unwrap();
        assert!(filter.accept(&event("SMS_ALERT disk full")));
        assert!(!filter.accept(&event("disk full SMS_ALERT")));
    }

    #[test]
    fn test_field_target() {
        let filter = RegexFilter::new("^METRICS").unwrap().on_field("tag");
        let tagged = LogEvent::new(
            LogLevel::Info,
            "whatever",
            LogContext::new().with_field("tag", "METRICS_GAUGE"),
        );
        assert!(filter.accept(&tagged));
        assert!(!filter.accept(&event("METRICS")));
    }

    #[test]
    fn test_strip_delimiters() {
        assert_eq!(strip_delimiters("/a/b/"), ("a/b", ""));
        assert_eq!(strip_delimiters("/x/im"), ("x", "im"));
        assert_eq!(strip_delimiters("plain"), ("plain", ""));
        assert_eq!(strip_delimiters("/"), ("/", ""));
    }

    #[test]
    fn test_path_is_not_delimited() {
        assert_eq!(strip_delimiters("/api/users"), ("/api/users", ""));
        assert_eq!(strip_delimiters("/x/iq"), ("/x/iq", ""));

        let filter = RegexFilter::new("/api/users").unwrap();
        assert!(filter.accept(&event("GET /api/users 200")));
        assert!(!filter.accept(&event("GET /api/orders 200")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(RegexFilter::new("(unclosed").is_err());
    }
}
