//! Core pipeline types and traits

pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod formatter;
pub mod log_context;
pub mod log_event;
pub mod log_level;
pub mod metrics;
pub mod overflow_policy;
pub mod processor;
pub mod timestamp;
pub mod writer;

pub use dispatcher::{DeliveryOutcome, Dispatcher, DispatcherBuilder, WriterBinding};
pub use error::{LoggerError, Result};
pub use fallback::FallbackChannel;
pub use filter::{Filter, FilterChain};
pub use formatter::{Formatter, MetricSample, Payload, PayloadKind};
pub use log_context::{ErrorChain, FieldValue, LogContext};
pub use log_event::LogEvent;
pub use log_level::LogLevel;
pub use metrics::DispatchMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use processor::Processor;
pub use timestamp::{parse_datetime, TimestampFormat};
pub use writer::{Writer, WriterState};
