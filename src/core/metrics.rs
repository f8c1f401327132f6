//! Dispatch metrics for observability
//!
//! Counters for monitoring pipeline health: how many events were fanned out,
//! and per destination how many were delivered, filtered, skipped or failed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for pipeline observability
///
/// One instance is kept by the dispatcher (counting logging calls) and one per
/// writer binding (counting what happened to each event at that destination).
///
/// # Example
///
/// ```
/// use rust_log_pipeline::DispatchMetrics;
///
/// let metrics = DispatchMetrics::new();
/// metrics.record_delivered();
/// metrics.record_failed();
///
/// assert_eq!(metrics.delivered_count(), 1);
/// assert_eq!(metrics.failed_count(), 1);
/// ```
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Events submitted to the pipeline
    dispatched: AtomicU64,

    /// Events handed to a writer without error
    delivered: AtomicU64,

    /// Events rejected by a filter chain
    filtered: AtomicU64,

    /// Events a formatter declined (missing required fields)
    skipped: AtomicU64,

    /// Events whose delivery raised an error or panicked
    failed: AtomicU64,

    /// Events dropped by an async writer's full queue
    dropped: AtomicU64,
}

impl DispatchMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered_count(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record a dispatched event; returns the previous count
    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_skipped(&self) -> u64 {
        self.skipped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    /// Failure rate as a percentage (0.0 - 100.0) of delivery attempts
    ///
    /// Returns 0.0 if nothing has been attempted.
    pub fn failure_rate(&self) -> f64 {
        let failed = self.failed_count() as f64;
        let total = self.delivered_count() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.dispatched.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.filtered.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DispatchMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            dispatched: AtomicU64::new(self.dispatched_count()),
            delivered: AtomicU64::new(self.delivered_count()),
            filtered: AtomicU64::new(self.filtered_count()),
            skipped: AtomicU64::new(self.skipped_count()),
            failed: AtomicU64::new(self.failed_count()),
            dropped: AtomicU64::new(self.dropped_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = DispatchMetrics::new();
        assert_eq!(metrics.dispatched_count(), 0);
        assert_eq!(metrics.delivered_count(), 0);
        assert_eq!(metrics.filtered_count(), 0);
        assert_eq!(metrics.skipped_count(), 0);
        assert_eq!(metrics.failed_count(), 0);
        assert_eq!(metrics.dropped_count(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = DispatchMetrics::new();
        assert_eq!(metrics.record_failed(), 0);
        assert_eq!(metrics.record_failed(), 1);
        assert_eq!(metrics.failed_count(), 2);
    }

    #[test]
    fn test_failure_rate() {
        let metrics = DispatchMetrics::new();
        assert_eq!(metrics.failure_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_delivered();
        }
        for _ in 0..10 {
            metrics.record_failed();
        }
        let rate = metrics.failure_rate();
        assert!((rate - 10.0).abs() < f64::EPSILON, "rate was {}", rate);

        // Filtered and skipped events are not delivery attempts
        metrics.record_filtered();
        metrics.record_skipped();
        assert!((metrics.failure_rate() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = DispatchMetrics::new();
        metrics.record_dispatched();
        metrics.record_dropped();
        metrics.reset();
        assert_eq!(metrics.dispatched_count(), 0);
        assert_eq!(metrics.dropped_count(), 0);
    }

    #[test]
    fn test_metrics_clone_is_snapshot() {
        let metrics = DispatchMetrics::new();
        metrics.record_delivered();

        let snapshot = metrics.clone();
        metrics.record_delivered();

        assert_eq!(snapshot.delivered_count(), 1);
        assert_eq!(metrics.delivered_count(), 2);
    }
}
