//! # fleet_log
//!
//! Correlation-aware structured logging for fleet automation workflows.
//!
//! ## Features
//!
//! - **Correlation**: Every entry carries the id of the operation it belongs
//!   to, with parent links between nested operations
//! - **Scopes**: Timed units of work that log their entry and exit
//! - **Structured Lines**: One JSON object per entry for downstream ingestion,
//!   plus a human console form
//! - **Sinks**: Console, rotating file, and a buffered remote sink flushed on a
//!   background thread
//!
//! ## Example
//!
//! ```
//! use fleet_log::prelude::*;
//!
//! let logger = Logger::builder()
//!     .min_level(LogLevel::Debug)
//!     .sink(ConsoleSink::new().with_output_format(OutputFormat::Console))
//!     .build();
//!
//! let outcome = run_within_scope(&logger, "PatchRollout", ScopeOptions::new(), |scope| {
//!     scope.add_context("batch", 1);
//!     logger.info("Patching 12 instances");
//!     Ok::<_, std::io::Error>(())
//! });
//! assert!(outcome.is_ok());
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        run_within_scope, ClearMode, CorrelationManager, CorrelationPrefix, ErrorInfo, FieldValue,
        LogContext, LogEntry, LogLevel, LogScope, Logger, LoggerBuilder, LoggerConfig, LoggerError,
        LoggerMetrics, OutputFormat, Result, ScopeError, ScopeHandle, ScopeOptions, Sink,
        WriteOptions, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{
        BufferConfig, CloudWatchBuffer, ConsoleSink, FileSink, LogShipper, RemoteEvent,
    };
}

pub use crate::core::{
    generate_correlation_id, run_within_scope, ClearMode, CorrelationContext, CorrelationManager,
    CorrelationPrefix, EntryMetadata, ErrorInfo, FieldValue, FlushMetrics, LogContext, LogEntry,
    LogLevel, LogScope, Logger, LoggerBuilder, LoggerConfig, LoggerError, LoggerMetrics,
    OutputFormat, Result, ScopeError, ScopeHandle, ScopeOptions, Sink, WriteOptions,
    DEFAULT_SHUTDOWN_TIMEOUT, MAX_MESSAGE_LENGTH,
};
pub use sinks::{
    BufferConfig, CloudWatchBuffer, ConsoleSink, FileSink, FlushReport, LogShipper, RemoteEvent,
};
