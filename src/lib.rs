//! # Rust Log Pipeline
//!
//! A structured log-event pipeline: every logging call builds one event,
//! runs it through a processor chain (id, backtrace, correlation token) and
//! fans it out to writer bindings. Each binding has its own filter chain and
//! formatter, and delivery failures stay inside the binding.
//!
//! ## Features
//!
//! - **Filter chains**: priority thresholds, regex matches, TTL rate limiting
//! - **Destinations**: streams, Logstash over UDP, Slack, HTTP metric
//!   collectors, Prometheus push gateway, append-only tables
//! - **Isolation**: a failing or panicking writer never affects the caller
//!   or its sibling writers
//! - **Async delivery**: any writer can be moved onto a background worker
//!
//! ## Example
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//!
//! let sink = MockWriter::new("audit");
//! let dispatcher = Dispatcher::builder()
//!     .processor(IdMaker::new())
//!     .processor(LifecycleTokenInjector::new())
//!     .writer(
//!         sink.clone(),
//!         FilterChain::new().with(PriorityFilter::new(Comparison::Le, 4)),
//!         FluentdFormatter::new(),
//!     )
//!     .unwrap()
//!     .build();
//!
//! dispatcher.warning("disk {mount} almost full", LogContext::new().with_field("mount", "/var")).unwrap();
//! dispatcher.debug("not delivered", LogContext::new()).unwrap();
//! assert_eq!(sink.len(), 1);
//! ```

pub mod config;
pub mod core;
pub mod filters;
pub mod formatters;
pub mod macros;
pub mod processors;
pub mod writers;

pub mod prelude {
    pub use crate::config::{build_dispatcher, PipelineConfig, Settings};
    pub use crate::core::{
        DeliveryOutcome, Dispatcher, DispatcherBuilder, FallbackChannel, FieldValue, Filter,
        FilterChain, Formatter, LogContext, LogEvent, LogLevel, LoggerError, Payload,
        PayloadKind, Processor, Result, Writer, WriterBinding, WriterState,
    };
    pub use crate::filters::{Comparison, PriorityFilter, RateLimitFilter, RegexFilter};
    pub use crate::formatters::{
        FluentdFormatter, LineFormatter, LogstashFormatter, MetricFormatter, SlackFormatter,
    };
    pub use crate::processors::{
        CorrelationScope, ExceptionBacktrace, IdMaker, LifecycleTokenInjector,
    };
    pub use crate::writers::{
        AsyncWriter, MockWriter, PrometheusOptions, PrometheusWriter, StreamWriter,
    };
}

pub use crate::config::{build_dispatcher, build_dispatcher_with, PipelineConfig, Settings};
pub use crate::core::{
    parse_datetime, DeliveryOutcome, DispatchMetrics, Dispatcher, DispatcherBuilder,
    ErrorChain, FallbackChannel, FieldValue, Filter, FilterChain, Formatter, LogContext, LogEvent,
    LogLevel, LoggerError, MetricSample, OverflowCallback, OverflowPolicy, Payload, PayloadKind,
    Processor, Result, TimestampFormat, Writer, WriterBinding, WriterState,
};
