//! Core logger types and traits

pub mod config;
pub mod correlation;
pub mod error;
pub mod error_info;
pub mod log_context;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod output_format;
pub mod scope;
pub mod sink;
pub(crate) mod structured_entry;
pub mod timestamp;

pub use config::LoggerConfig;
pub use correlation::{
    generate_correlation_id, ClearMode, CorrelationContext, CorrelationManager, CorrelationPrefix,
};
pub use error::{LoggerError, Result};
pub use error_info::ErrorInfo;
pub use log_context::{FieldValue, LogContext};
pub use log_entry::{EntryMetadata, LogEntry, MAX_MESSAGE_LENGTH};
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder, WriteOptions, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics::{FlushMetrics, LoggerMetrics};
pub use output_format::OutputFormat;
pub use scope::{run_within_scope, LogScope, ScopeError, ScopeHandle, ScopeOptions};
pub use sink::Sink;
