//! Error types for the log pipeline
//!
//! Caller misuse (`InvalidLevel`, `InvalidDateFormat`) is returned from the
//! logging call. Everything raised on the delivery side stays inside the
//! dispatcher and is reported to the fallback channel instead.

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Level name is not one of the eight recognized severities
    #[error("Invalid level: '{level}'")]
    InvalidLevel { level: String },

    /// Id/date prefix of a message could not be parsed as a date
    #[error("Invalid date format: '{input}'")]
    InvalidDateFormat { input: String },

    /// Sink-local delivery failure
    #[error("Delivery failed for writer '{writer}': {message}")]
    Delivery { writer: String, message: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML configuration error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Metric registry error
    #[error("Metric registry error: {0}")]
    MetricError(#[from] prometheus::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Regex compilation error
    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    /// Channel send error
    #[error("Failed to hand payload to async worker")]
    ChannelSendError,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    pub fn invalid_level(level: impl Into<String>) -> Self {
        LoggerError::InvalidLevel {
            level: level.into(),
        }
    }

    pub fn invalid_date(input: impl Into<String>) -> Self {
        LoggerError::InvalidDateFormat {
            input: input.into(),
        }
    }

    /// Create a delivery error for the named writer
    pub fn delivery(writer: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Delivery {
            writer: writer.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Errors that indicate misuse by the caller of the logging call
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            LoggerError::InvalidLevel { .. } | LoggerError::InvalidDateFormat { .. }
        )
    }
}
