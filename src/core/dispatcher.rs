//! Dispatcher: processor chain plus fan-out to writer bindings

use super::{
    error::Result,
    fallback::FallbackChannel,
    filter::FilterChain,
    formatter::Formatter,
    log_context::LogContext,
    log_event::LogEvent,
    log_level::LogLevel,
    metrics::DispatchMetrics,
    processor::Processor,
    writer::{Writer, WriterState},
};
use crate::core::error::LoggerError;
use crate::processors::IdMaker;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};

/// What happened to one event at one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Rejected by the filter chain
    Filtered,
    /// Formatter declined the event (missing required fields)
    Skipped,
    /// Writer returned an error or panicked
    Failed,
}

/// A writer together with its filter chain and formatter
///
/// Built once at startup; immutable afterwards apart from its counters.
pub struct WriterBinding {
    name: String,
    writer: Box<dyn Writer>,
    filters: FilterChain,
    formatter: Box<dyn Formatter>,
    state: AtomicU8,
    metrics: DispatchMetrics,
}

impl WriterBinding {
    /// Bind a writer; fails when the writer cannot carry the formatter's payload
    pub fn new(
        writer: Box<dyn Writer>,
        filters: FilterChain,
        formatter: Box<dyn Formatter>,
    ) -> Result<Self> {
        let name = writer.name().to_string();
        Self::named(name, writer, filters, formatter)
    }

    pub fn named(
        name: impl Into<String>,
        writer: Box<dyn Writer>,
        filters: FilterChain,
        formatter: Box<dyn Formatter>,
    ) -> Result<Self> {
        let name = name.into();
        if !writer.accepts(formatter.kind()) {
            return Err(LoggerError::config(
                name,
                format!(
                    "writer '{}' cannot deliver {:?} payloads from formatter '{}'",
                    writer.name(),
                    formatter.kind(),
                    formatter.name()
                ),
            ));
        }

        Ok(Self {
            name,
            writer,
            filters,
            formatter,
            state: AtomicU8::new(WriterState::Idle as u8),
            metrics: DispatchMetrics::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WriterState {
        WriterState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Filter, format and write one event. Never propagates a failure.
    pub fn dispatch(&self, event: &LogEvent, fallback: &FallbackChannel) -> DeliveryOutcome {
        if !self.filters.accept(event) {
            self.metrics.record_filtered();
            return DeliveryOutcome::Filtered;
        }

        let payload = match self.formatter.format(event) {
            Some(payload) => payload,
            None => {
                self.metrics.record_skipped();
                return DeliveryOutcome::Skipped;
            }
        };

        self.set_state(WriterState::Writing);
        let result = catch_unwind(AssertUnwindSafe(|| self.writer.write(&payload)));

        match result {
            Ok(Ok(())) => {
                self.metrics.record_delivered();
                self.set_state(WriterState::Idle);
                DeliveryOutcome::Delivered
            }
            Ok(Err(e)) => {
                self.set_state(WriterState::FailedDelivery);
                self.metrics.record_failed();
                fallback.error(format!("Writer '{}' failed: {}", self.name, e));
                self.set_state(WriterState::Idle);
                DeliveryOutcome::Failed
            }
            Err(panic_info) => {
                self.set_state(WriterState::FailedDelivery);
                self.metrics.record_failed();
                fallback.critical(format!(
                    "Writer '{}' panicked: {}. Other writers continue to function.",
                    self.name,
                    panic_message(panic_info)
                ));
                self.set_state(WriterState::Idle);
                DeliveryOutcome::Failed
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.writer.flush()
    }

    fn set_state(&self, state: WriterState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl std::fmt::Debug for WriterBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterBinding")
            .field("name", &self.name)
            .field("writer", &self.writer.name())
            .field("formatter", &self.formatter.name())
            .field("filters", &self.filters)
            .finish()
    }
}

fn panic_message(panic_info: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Owns the processor chain and the writer bindings.
///
/// Share it behind an `Arc`; `log` takes `&self` and fans out synchronously
/// on the calling thread.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::prelude::*;
///
/// let dispatcher = Dispatcher::builder()
///     .processor(IdMaker::new())
///     .fallback(FallbackChannel::Silent)
///     .build();
///
/// let id = dispatcher
///     .log("info", "user {u} logged in", LogContext::new().with_field("u", "bob"))
///     .unwrap();
/// assert!(!id.is_empty());
/// assert!(dispatcher.log("verbose", "nope", LogContext::new()).is_err());
/// ```
pub struct Dispatcher {
    processors: Vec<Box<dyn Processor>>,
    bindings: Vec<WriterBinding>,
    id_maker: IdMaker,
    metrics: DispatchMetrics,
    fallback: FallbackChannel,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Log with a level name; returns the event id
    ///
    /// Fails with `InvalidLevel` for names outside the eight severities and
    /// with `InvalidDateFormat` for an unparseable id/date prefix.
    pub fn log(&self, level: &str, message: &str, context: LogContext) -> Result<String> {
        let level: LogLevel = level.parse()?;
        self.log_level(level, message, context)
    }

    pub fn log_level(&self, level: LogLevel, message: &str, context: LogContext) -> Result<String> {
        let event = self.prepare(level, message, context)?;
        self.fan_out(&event);
        Ok(event.id().to_string())
    }

    /// Build and enrich an event without delivering it
    pub fn prepare(&self, level: LogLevel, message: &str, context: LogContext) -> Result<LogEvent> {
        let mut event = LogEvent::new(level, message, context);
        for processor in &self.processors {
            processor.process(&mut event)?;
        }
        if event.id.is_none() {
            self.id_maker.process(&mut event)?;
        }
        Ok(event)
    }

    /// Deliver an enriched event to every binding whose filters pass
    pub fn fan_out(&self, event: &LogEvent) -> Vec<DeliveryOutcome> {
        self.metrics.record_dispatched();
        let outcomes: Vec<_> = self
            .bindings
            .iter()
            .map(|binding| binding.dispatch(event, &self.fallback))
            .collect();

        for outcome in &outcomes {
            match outcome {
                DeliveryOutcome::Delivered => self.metrics.record_delivered(),
                DeliveryOutcome::Filtered => self.metrics.record_filtered(),
                DeliveryOutcome::Skipped => self.metrics.record_skipped(),
                DeliveryOutcome::Failed => self.metrics.record_failed(),
            };
        }
        outcomes
    }

    #[inline]
    pub fn emergency(&self, message: &str, context: LogContext) -> Result<String> {
        self.log_level(LogLevel::Emergency, message, context)
    }

    #[inline]
    pub fn alert(&self, message: &str, context: LogContext) -> Result<String> {
        self.log_level(LogLevel::Alert, message, context)
    }

    #[inline]
    pub fn critical(&self, message: &str, context: LogContext) -> Result<String> {
        self.log_level(LogLevel::Critical, message, context)
    }

    #[inline]
    pub fn error(&self, message: &str, context: LogContext) -> Result<String> {
        self.log_level(LogLevel::Error, message, context)
    }

    #[inline]
    pub fn warning(&self, message: &str, context: LogContext) -> Result<String> {
        self.log_level(LogLevel::Warning, message, context)
    }

    #[inline]
    pub fn notice(&self, message: &str, context: LogContext) -> Result<String> {
        self.log_level(LogLevel::Notice, message, context)
    }

    #[inline]
    pub fn info(&self, message: &str, context: LogContext) -> Result<String> {
        self.log_level(LogLevel::Info, message, context)
    }

    #[inline]
    pub fn debug(&self, message: &str, context: LogContext) -> Result<String> {
        self.log_level(LogLevel::Debug, message, context)
    }

    pub fn bindings(&self) -> &[WriterBinding] {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&WriterBinding> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    /// Dispatcher-wide counters (per-binding counters live on each binding)
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn fallback(&self) -> &FallbackChannel {
        &self.fallback
    }

    /// Flush every writer, reporting failures to the fallback channel
    pub fn flush(&self) {
        for binding in &self.bindings {
            if let Err(e) = binding.flush() {
                self.fallback
                    .error(format!("Writer '{}' flush failed: {}", binding.name(), e));
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.flush();

        let failed = self.metrics.failed_count();
        if failed > 0 {
            self.fallback.warning(format!(
                "Dispatcher shutting down with {} failed deliveries (failure rate: {:.2}%)",
                failed,
                self.metrics.failure_rate()
            ));
        }
    }
}

/// Builder for constructing a Dispatcher with a fluent API
pub struct DispatcherBuilder {
    processors: Vec<Box<dyn Processor>>,
    bindings: Vec<WriterBinding>,
    fallback: FallbackChannel,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
            bindings: Vec::new(),
            fallback: FallbackChannel::default(),
        }
    }

    /// Append a processor; processors run in insertion order
    #[must_use = "builder methods return a new value"]
    pub fn processor<P: Processor + 'static>(mut self, processor: P) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_processor(mut self, processor: Box<dyn Processor>) -> Self {
        self.processors.push(processor);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn binding(mut self, binding: WriterBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Bind a writer with its filters and formatter
    pub fn writer<W, F>(self, writer: W, filters: FilterChain, formatter: F) -> Result<Self>
    where
        W: Writer + 'static,
        F: Formatter + 'static,
    {
        let binding = WriterBinding::new(Box::new(writer), filters, Box::new(formatter))?;
        Ok(self.binding(binding))
    }

    #[must_use = "builder methods return a new value"]
    pub fn fallback(mut self, fallback: FallbackChannel) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            processors: self.processors,
            bindings: self.bindings,
            id_maker: IdMaker::new(),
            metrics: DispatchMetrics::new(),
            fallback: self.fallback,
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
