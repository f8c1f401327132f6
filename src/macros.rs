//! Logging macros with inline context fields.
//!
//! Messages are templates: `{key}` placeholders are resolved from the
//! context, so the macros take `key = value` pairs instead of format
//! arguments. Every macro evaluates to the `Result<String>` of the logging
//! call (the event id).
//!
//! # Examples
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::{info, warning};
//!
//! let dispatcher = Dispatcher::builder().fallback(FallbackChannel::Silent).build();
//!
//! info!(dispatcher, "Server started").unwrap();
//! info!(dispatcher, "User {user} logged in", user = "bob", attempt = 2).unwrap();
//! warning!(dispatcher, "METRICS", metricId = "queue_depth", value = 17).unwrap();
//! ```

/// Log at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let dispatcher = Dispatcher::builder().fallback(FallbackChannel::Silent).build();
/// use rust_log_pipeline::log;
/// let id = log!(dispatcher, LogLevel::Notice, "Cache warmed").unwrap();
/// assert!(!id.is_empty());
/// log!(dispatcher, LogLevel::Error, "Order {order} failed", order = 42).unwrap();
/// ```
#[macro_export]
macro_rules! log {
    ($dispatcher:expr, $level:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut context = $crate::LogContext::new();
        $( context.add_field(stringify!($key), $value); )*
        $dispatcher.log_level($level, &$message, context)
    }};
}

#[macro_export]
macro_rules! emergency {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Emergency, $($arg)+)
    };
}

#[macro_export]
macro_rules! alert {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Alert, $($arg)+)
    };
}

#[macro_export]
macro_rules! critical {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Critical, $($arg)+)
    };
}

/// Log an error-level message.
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let dispatcher = Dispatcher::builder().fallback(FallbackChannel::Silent).build();
/// use rust_log_pipeline::error;
/// error!(dispatcher, "Failed to connect to {host}", host = "db-1").unwrap();
/// ```
#[macro_export]
macro_rules! error {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! warning {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! notice {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Notice, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Debug, $($arg)+)
    };
}
