//! Background delivery for slow writers
//!
//! [`AsyncWriter`] wraps any writer: `write` enqueues the payload on a bounded
//! channel and returns, and a dedicated worker thread delivers payloads in
//! submission order. Queue overflow is handled by an [`OverflowPolicy`].

use crate::core::{
    DispatchMetrics, FallbackChannel, LoggerError, OverflowCallback, OverflowPolicy, Payload,
    PayloadKind, Result, Writer,
};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 1024;

/// Default shutdown timeout when the writer is dropped (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Alert on the first drop and then every this many drops
const ALERT_INTERVAL: u64 = 1000;

pub struct AsyncWriterBuilder {
    inner: Box<dyn Writer>,
    capacity: usize,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    fallback: FallbackChannel,
    shutdown_timeout: Duration,
}

impl AsyncWriterBuilder {
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Called with the running drop count when payloads are dropped
    #[must_use]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// Where delivery failures of the wrapped writer are reported
    #[must_use]
    pub fn fallback(mut self, fallback: FallbackChannel) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Start the worker thread
    pub fn spawn(self) -> Result<AsyncWriter> {
        let (sender, receiver) = bounded::<Payload>(self.capacity);
        let inner: Arc<dyn Writer> = Arc::from(self.inner);
        let name = format!("async:{}", inner.name());
        let metrics = Arc::new(DispatchMetrics::new());
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            receiver: receiver.clone(),
            inner: Arc::clone(&inner),
            metrics: Arc::clone(&metrics),
            pending: Arc::clone(&pending),
            fallback: self.fallback.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("log-{}", inner.name()))
            .spawn(move || worker.run())?;

        Ok(AsyncWriter {
            name,
            inner,
            sender: Some(sender),
            receiver,
            handle: Some(handle),
            metrics,
            pending,
            overflow_policy: self.overflow_policy,
            on_overflow: self.on_overflow,
            fallback: self.fallback,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

struct Worker {
    receiver: Receiver<Payload>,
    inner: Arc<dyn Writer>,
    metrics: Arc<DispatchMetrics>,
    pending: Arc<AtomicUsize>,
    fallback: FallbackChannel,
}

impl Worker {
    fn run(self) {
        // Ends once every sender is gone and the queue is drained
        while let Ok(payload) = self.receiver.recv() {
            self.deliver(&payload);
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn deliver(&self, payload: &Payload) {
        match catch_unwind(AssertUnwindSafe(|| self.inner.write(payload))) {
            Ok(Ok(())) => {
                self.metrics.record_delivered();
            }
            Ok(Err(e)) => {
                self.metrics.record_failed();
                self.fallback
                    .error(format!("Async writer '{}' failed: {}", self.inner.name(), e));
            }
            Err(_) => {
                self.metrics.record_failed();
                self.fallback.critical(format!(
                    "Async writer '{}' panicked; worker continues",
                    self.inner.name()
                ));
            }
        }
    }
}

/// Wraps a writer so delivery happens on a background thread
///
/// # Example
///
/// ```
/// use rust_log_pipeline::writers::{AsyncWriter, MockWriter};
/// use rust_log_pipeline::{OverflowPolicy, Payload, Writer};
///
/// let sink = MockWriter::new("slow");
/// let writer = AsyncWriter::builder(sink.clone())
///     .capacity(16)
///     .overflow_policy(OverflowPolicy::Block)
///     .spawn()
///     .unwrap();
///
/// writer.write(&Payload::Line("queued".into())).unwrap();
/// writer.flush().unwrap();
/// assert_eq!(sink.len(), 1);
/// ```
pub struct AsyncWriter {
    name: String,
    inner: Arc<dyn Writer>,
    sender: Option<Sender<Payload>>,
    /// Kept for `DropOldest` eviction
    receiver: Receiver<Payload>,
    handle: Option<JoinHandle<()>>,
    metrics: Arc<DispatchMetrics>,
    /// Payloads enqueued but not yet handled by the worker
    pending: Arc<AtomicUsize>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    fallback: FallbackChannel,
    shutdown_timeout: Duration,
}

impl AsyncWriter {
    pub fn builder<W: Writer + 'static>(inner: W) -> AsyncWriterBuilder {
        Self::builder_boxed(Box::new(inner))
    }

    pub fn builder_boxed(inner: Box<dyn Writer>) -> AsyncWriterBuilder {
        AsyncWriterBuilder {
            inner,
            capacity: DEFAULT_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
            fallback: FallbackChannel::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Wrap with default capacity and policy
    pub fn new<W: Writer + 'static>(inner: W) -> Result<Self> {
        Self::builder(inner).spawn()
    }

    /// Delivered/failed/dropped counts of the background worker
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn dropped_count(&self) -> u64 {
        self.metrics.dropped_count()
    }

    pub fn queue_len(&self) -> usize {
        self.receiver.len()
    }

    pub fn overflow_policy(&self) -> &OverflowPolicy {
        &self.overflow_policy
    }

    /// Close the queue and wait for the worker to drain it
    ///
    /// Returns `false` if the worker did not finish within `timeout`.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        drop(self.sender.take());

        let Some(handle) = self.handle.take() else {
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    self.fallback.error(format!(
                        "Async worker for '{}' panicked during shutdown",
                        self.inner.name()
                    ));
                    return false;
                }
                break;
            }
            if start.elapsed() >= timeout {
                self.fallback.warning(format!(
                    "Async worker for '{}' did not finish within {:?}. Some payloads may be lost.",
                    self.inner.name(),
                    timeout
                ));
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }

        if let Err(e) = self.inner.flush() {
            self.fallback
                .error(format!("Failed to flush '{}' during shutdown: {}", self.inner.name(), e));
            return false;
        }
        true
    }

    fn enqueue(&self, sender: &Sender<Payload>, payload: Payload) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        match sender.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(payload)) => self.handle_overflow(sender, payload),
            Err(TrySendError::Disconnected(_)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Err(LoggerError::ChannelSendError)
            }
        }
    }

    fn handle_overflow(&self, sender: &Sender<Payload>, payload: Payload) -> Result<()> {
        match &self.overflow_policy {
            OverflowPolicy::DropNewest => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                self.metrics.record_dropped();
                Ok(())
            }

            OverflowPolicy::DropOldest => {
                if self.receiver.try_recv().is_ok() {
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                    self.metrics.record_dropped();
                }
                match sender.try_send(payload) {
                    Ok(()) => Ok(()),
                    // The worker raced us, or other callers refilled the slot
                    Err(TrySendError::Full(_)) => {
                        self.drop_with_alert();
                        Ok(())
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        self.pending.fetch_sub(1, Ordering::AcqRel);
                        Err(LoggerError::ChannelSendError)
                    }
                }
            }

            OverflowPolicy::Block => sender.send(payload).map_err(|_| {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                LoggerError::ChannelSendError
            }),

            OverflowPolicy::BlockWithTimeout(timeout) => {
                match sender.send_timeout(payload, *timeout) {
                    Ok(()) => Ok(()),
                    Err(SendTimeoutError::Timeout(_)) => {
                        self.drop_with_alert();
                        Ok(())
                    }
                    Err(SendTimeoutError::Disconnected(_)) => {
                        self.pending.fetch_sub(1, Ordering::AcqRel);
                        Err(LoggerError::ChannelSendError)
                    }
                }
            }

            OverflowPolicy::AlertAndDrop => {
                self.drop_with_alert();
                Ok(())
            }
        }
    }

    fn drop_with_alert(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        let previous = self.metrics.record_dropped();

        if previous == 0 || (previous + 1) % ALERT_INTERVAL == 0 {
            self.fallback.warning(format!(
                "Queue for '{}' full, {} payloads dropped under {} policy. \
                 Consider increasing capacity or using a different overflow policy.",
                self.inner.name(),
                previous + 1,
                self.overflow_policy
            ));
            if let Some(ref callback) = self.on_overflow {
                callback(previous + 1);
            }
        }
    }
}

impl Writer for AsyncWriter {
    fn write(&self, payload: &Payload) -> Result<()> {
        match self.sender {
            Some(ref sender) => self.enqueue(sender, payload.clone()),
            None => Err(LoggerError::ChannelSendError),
        }
    }

    /// Wait until the queue is drained, then flush the wrapped writer
    fn flush(&self) -> Result<()> {
        let start = Instant::now();
        while self.pending.load(Ordering::Acquire) > 0 {
            if start.elapsed() >= self.shutdown_timeout {
                return Err(LoggerError::delivery(
                    &self.name,
                    format!(
                        "{} payloads still queued after {:?}",
                        self.pending.load(Ordering::Acquire),
                        self.shutdown_timeout
                    ),
                ));
            }
            thread::sleep(Duration::from_millis(1));
        }
        self.inner.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, kind: PayloadKind) -> bool {
        self.inner.accepts(kind)
    }
}

impl Drop for AsyncWriter {
    fn drop(&mut self) {
        let timeout = self.shutdown_timeout;
        self.shutdown(timeout);

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            self.fallback.warning(format!(
                "Async writer '{}' dropped {} payloads during its lifetime",
                self.inner.name(),
                dropped
            ));
        }
    }
}

impl std::fmt::Debug for AsyncWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncWriter")
            .field("name", &self.name)
            .field("overflow_policy", &self.overflow_policy)
            .field("queued", &self.queue_len())
            .finish()
    }
}
