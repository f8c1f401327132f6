//! Duplicate suppression within a TTL window
//!
//! Used in front of alert-style destinations (SMS, pagers) so that a
//! repeating failure produces one notification per window instead of one per
//! occurrence.

use crate::core::{Filter, LogEvent, LoggerError, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Most signatures tracked at once; the oldest are forgotten beyond this
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Computes the identity of an event for duplicate detection
pub type SignatureFn = Arc<dyn Fn(&LogEvent) -> String + Send + Sync>;

/// Signatures in the order they were last passed
#[derive(Default)]
struct Seen {
    last: HashMap<String, Instant>,
    order: VecDeque<(String, Instant)>,
}

impl Seen {
    fn pop_oldest(&mut self) {
        if let Some((signature, at)) = self.order.pop_front() {
            if self.last.get(&signature) == Some(&at) {
                self.last.remove(&signature);
            }
        }
    }

    /// Drop entries whose window has closed; `order` is sorted by time
    fn expire(&mut self, now: Instant, ttl: Duration) {
        while let Some((_, at)) = self.order.front() {
            if now.duration_since(*at) < ttl {
                break;
            }
            self.pop_oldest();
        }
    }
}

/// Passes the first event of each signature, then suppresses repeats until
/// `ttl` has elapsed since the last passed one.
///
/// Only events that reach this filter are recorded. Place it after the
/// filters that select what should be limited, or every event on the
/// binding takes a slot.
pub struct RateLimitFilter {
    ttl: Duration,
    seen: Mutex<Seen>,
    signature: SignatureFn,
    capacity: usize,
}

impl RateLimitFilter {
    /// Signature is level plus message
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(Seen::default()),
            signature: Arc::new(|event: &LogEvent| format!("{}:{}", event.level, event.message)),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Build from a TTL string such as `"24h"`
    pub fn parse(ttl: &str) -> Result<Self> {
        Ok(Self::new(parse_ttl(ttl)?))
    }

    #[must_use]
    pub fn with_signature(mut self, signature: SignatureFn) -> Self {
        self.signature = signature;
        self
    }

    /// Bound the number of tracked signatures
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of signatures currently inside their window
    pub fn tracked(&self) -> usize {
        self.seen.lock().last.len()
    }
}

impl Filter for RateLimitFilter {
    fn accept(&self, event: &LogEvent) -> bool {
        let signature = (self.signature)(event);

        let mut seen = self.seen.lock();
        let now = Instant::now();
        seen.expire(now, self.ttl);
        if seen.last.contains_key(&signature) {
            return false;
        }

        while seen.last.len() >= self.capacity {
            seen.pop_oldest();
        }
        seen.order.push_back((signature.clone(), now));
        seen.last.insert(signature, now);
        true
    }

    fn name(&self) -> &str {
        "rate_limit"
    }
}

impl std::fmt::Debug for RateLimitFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitFilter")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .field("tracked", &self.tracked())
            .finish()
    }
}

/// Parse `"90"`, `"15s"`, `"30m"`, `"24h"` or `"2d"`
pub fn parse_ttl(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let invalid = || LoggerError::config("rate limit filter", format!("invalid ttl '{}'", input));

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;

    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    let seconds = amount.checked_mul(multiplier).ok_or_else(invalid)?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogContext, LogLevel};

    fn event(message: &str) -> LogEvent {
        LogEvent::new(LogLevel::Critical, message, LogContext::new())
    }

    #[test]
    fn test_duplicates_suppressed_within_ttl() {
        let filter = RateLimitFilter::new(Duration::from_secs(60));
        assert!(filter.accept(&event("SMS_ALERT disk full")));
        assert!(!filter.accept(&event("SMS_ALERT disk full")));
        assert!(filter.accept(&event("SMS_ALERT cpu hot")));
    }

    #[test]
    fn test_passes_again_after_ttl() {
        let filter = RateLimitFilter::new(Duration::from_millis(30));
        assert!(filter.accept(&event("again")));
        std::thread::sleep(Duration::from_millis(60));
        assert!(filter.accept(&event("again")));
    }

    #[test]
    fn test_custom_signature() {
        let filter = RateLimitFilter::new(Duration::from_secs(60))
            .with_signature(Arc::new(|e: &LogEvent| e.level.to_string()));
        assert!(filter.accept(&event("a")));
        assert!(!filter.accept(&event("b")));
    }

    #[test]
    fn test_expired_entries_pruned() {
        let filter = RateLimitFilter::new(Duration::from_millis(10));
        filter.accept(&event("one"));
        filter.accept(&event("two"));
        std::thread::sleep(Duration::from_millis(30));
        filter.accept(&event("three"));
        assert_eq!(filter.tracked(), 1);
    }

    #[test]
    fn test_capacity_bounds_tracking() {
        let filter = RateLimitFilter::new(Duration::from_secs(3600)).with_capacity(3);
        for i in 0..50 {
            assert!(filter.accept(&event(&format!("node {} down", i))));
        }
        assert_eq!(filter.tracked(), 3);

        // The newest signatures are still suppressed, the evicted ones pass
        assert!(!filter.accept(&event("node 49 down")));
        assert!(filter.accept(&event("node 0 down")));
        assert_eq!(filter.tracked(), 3);
    }

    #[test]
    fn test_rejected_upstream_never_tracked() {
        use crate::core::FilterChain;
        use crate::filters::RegexFilter;

        let limiter = Arc::new(RateLimitFilter::new(Duration::from_secs(3600)));
        let chain = FilterChain::new()
            .with(RegexFilter::new("^SMS_ALERT").unwrap())
            .with(Arc::clone(&limiter));

        for i in 0..100 {
            assert!(!chain.accept(&event(&format!("request {} served", i))));
        }
        assert_eq!(limiter.tracked(), 0);

        assert!(chain.accept(&event("SMS_ALERT disk full")));
        assert!(!chain.accept(&event("SMS_ALERT disk full")));
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_ttl("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse_ttl("15s").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_ttl("2d").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_ttl("90").unwrap(), Duration::from_secs(90));
        assert!(parse_ttl("h").is_err());
        assert!(parse_ttl("5 weeks").is_err());
        assert!(parse_ttl("99999999999999999d").is_err());
        assert!(parse_ttl("99999999999999999999").is_err());
        assert_eq!(
            parse_ttl(&format!("{}s", u64::MAX)).unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }
}
