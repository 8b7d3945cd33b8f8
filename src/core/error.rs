//! Error types for the logging core

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Message was empty or whitespace only
    #[error("Log message cannot be empty or whitespace")]
    EmptyMessage,

    /// Message exceeded the maximum length
    #[error("Log message too long: {length} characters (maximum {max})")]
    MessageTooLong { length: usize, max: usize },

    /// Scope name was empty or whitespace only
    #[error("Scope name cannot be empty or whitespace")]
    EmptyScopeName,

    /// Structured line could not be parsed
    #[error("Invalid structured log format: {0}")]
    InvalidFormat(String),

    /// Timestamp was not ISO-8601
    #[error("Invalid timestamp '{0}': expected ISO-8601 UTC")]
    InvalidTimestamp(String),

    /// Unknown log level name
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),

    /// Correlation prefix token failed validation
    #[error("Invalid correlation prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Remote sink cannot be reached or was never configured
    #[error("Remote log sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Remote sink rejected a batch
    #[error("Log shipper error: {0}")]
    ShipperError(String),
}

impl LoggerError {
    /// Create a message-too-long error
    pub fn message_too_long(length: usize, max: usize) -> Self {
        LoggerError::MessageTooLong { length, max }
    }

    /// Create an invalid format error
    pub fn invalid_format(message: impl Into<String>) -> Self {
        LoggerError::InvalidFormat(message.into())
    }

    /// Create an invalid timestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        LoggerError::InvalidTimestamp(value.into())
    }

    /// Create an invalid level error
    pub fn invalid_level(value: impl Into<String>) -> Self {
        LoggerError::InvalidLevel(value.into())
    }

    /// Create an invalid prefix error
    pub fn invalid_prefix(prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        LoggerError::InvalidPrefix {
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a sink unavailable error
    pub fn sink_unavailable<S: Into<String>>(msg: S) -> Self {
        LoggerError::SinkUnavailable(msg.into())
    }

    /// Create a shipper error
    pub fn shipper<S: Into<String>>(msg: S) -> Self {
        LoggerError::ShipperError(msg.into())
    }

    /// Whether this error signals caller misuse at construction time
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LoggerError::EmptyMessage
                | LoggerError::MessageTooLong { .. }
                | LoggerError::EmptyScopeName
                | LoggerError::InvalidPrefix { .. }
        )
    }
}
