//! Main logger implementation
//!
//! `Logger::write` is the emit pipeline: level filter, correlation
//! resolution, scope enrichment, error capture, entry construction, sink
//! dispatch and remote buffering. Nothing after the level filter returns an
//! error to the caller; failures are reported on stderr and counted.

use super::{
    config::LoggerConfig,
    correlation::CorrelationManager,
    error::Result,
    error_info::ErrorInfo,
    log_context::{FieldValue, LogContext},
    log_entry::{LogEntry, DEFAULT_MODULE},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    scope::{LogScope, ScopeError, ScopeOptions},
    sink::Sink,
};
use crate::sinks::cloudwatch::{BufferConfig, CloudWatchBuffer, FlushReport, LogShipper};
use crate::sinks::console::ConsoleSink;
use crate::sinks::file::FileSink;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Default shutdown timeout for logger cleanup (5 seconds)
///
/// This timeout is used when the logger is dropped without explicit shutdown.
/// For custom timeout control, use the `shutdown()` method instead.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-call options for [`Logger::write`]
///
/// # Example
///
/// ```
/// use fleet_log::{Logger, LogLevel, WriteOptions};
///
/// let logger = Logger::new();
/// let entry = logger.write(
///     "Patch baseline applied",
///     WriteOptions::new()
///         .with_level(LogLevel::Warning)
///         .with_field("instanceId", "i-0abc")
///         .with_pass_thru(true),
/// );
/// assert_eq!(entry.unwrap().level(), LogLevel::Warning);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub level: LogLevel,
    pub context: LogContext,
    pub correlation_id: Option<String>,
    pub error: Option<ErrorInfo>,
    pub function_name: Option<String>,
    pub script_name: Option<String>,
    /// Queue for the remote sink even when remote logging is off globally
    pub remote: bool,
    /// Return the constructed entry to the caller
    pub pass_thru: bool,
    pub(crate) scope_name: Option<String>,
    pub(crate) parent_correlation_id: Option<String>,
    pub(crate) duration: Option<Duration>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = context;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.context.add_field(key, value);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Attach an error; its type, message, source and backtrace go into context
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_error<E: std::error::Error + ?Sized>(mut self, error: &E) -> Self {
        self.error = Some(ErrorInfo::from_error(error));
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error = Some(info);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = Some(name.into());
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_pass_thru(mut self, pass_thru: bool) -> Self {
        self.pass_thru = pass_thru;
        self
    }
}

struct LoggerInner {
    min_level: RwLock<LogLevel>,
    sinks: RwLock<Vec<Box<dyn Sink>>>,
    /// Created on first remote write
    remote: OnceLock<CloudWatchBuffer>,
    remote_config: BufferConfig,
    shipper: Option<Arc<dyn LogShipper>>,
    remote_enabled: bool,
    /// Pinned stack; `None` means the calling thread's ambient stack
    correlation: Option<CorrelationManager>,
    module: String,
    metrics: LoggerMetrics,
}

/// Cloneable handle to one logging pipeline
///
/// Clones share sinks, level, metrics and the remote buffer. The last clone
/// to drop shuts the remote flusher down and flushes the sinks.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    /// Logger with no sinks at `Information`
    #[must_use]
    pub fn new() -> Self {
        LoggerBuilder::new().build()
    }

    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use fleet_log::prelude::*;
    ///
    /// let logger = Logger::builder()
    ///     .min_level(LogLevel::Debug)
    ///     .sink(ConsoleSink::new())
    ///     .module("patching")
    ///     .build();
    /// ```
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Build a logger from validated configuration
    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        Ok(LoggerBuilder::from_config(config)?.build())
    }

    /// Emit one entry through the pipeline
    ///
    /// Returns the entry only when `options.pass_thru` is set and the entry
    /// was not filtered or rejected.
    pub fn write(&self, message: impl Into<String>, options: WriteOptions) -> Option<LogEntry> {
        if options.level < *self.inner.min_level.read() {
            return None;
        }

        let WriteOptions {
            level,
            mut context,
            correlation_id,
            error,
            function_name,
            script_name,
            remote,
            pass_thru,
            mut scope_name,
            mut parent_correlation_id,
            duration,
        } = options;

        let top = self.correlation().current_context();
        let correlation_id =
            correlation_id.or_else(|| top.as_ref().map(|c| c.correlation_id.clone()));

        // Entries written under the active scope carry its name; the parent
        // id only follows when the entry stays on the scope's own id
        if let Some(top) = top {
            if parent_correlation_id.is_none()
                && correlation_id.as_deref() == Some(top.correlation_id.as_str())
            {
                parent_correlation_id = top.parent_correlation_id;
            }
            if scope_name.is_none() {
                scope_name = top.scope_name;
            }
        }

        if let Some(ref info) = error {
            info.merge_into(&mut context);
        }

        let mut entry = match LogEntry::with_module(level, message, self.inner.module.as_str()) {
            Ok(entry) => entry.with_context(context),
            Err(e) => {
                self.inner.metrics.record_rejected();
                eprintln!("[LOGGER WARNING] Dropping log entry: {}", e);
                return None;
            }
        };
        if let Some(id) = correlation_id {
            entry = entry.with_correlation_id(id);
        }
        if let Some(parent) = parent_correlation_id {
            entry = entry.with_parent_correlation_id(parent);
        }
        if let Some(scope) = scope_name {
            entry = entry.with_scope_name(scope);
        }
        if let Some(elapsed) = duration {
            entry = entry.with_duration(elapsed);
        }
        if let Some(name) = function_name {
            entry = entry.with_function_name(name);
        }
        if let Some(name) = script_name {
            entry = entry.with_script_name(name);
        }

        self.dispatch(&entry);
        self.inner.metrics.record_logged();

        if self.inner.remote_enabled || remote {
            self.remote().push(entry.clone());
        }

        if pass_thru {
            Some(entry)
        } else {
            None
        }
    }

    /// Hand an entry to every sink with per-sink panic isolation
    fn dispatch(&self, entry: &LogEntry) {
        let mut sinks = self.inner.sinks.write();

        for sink in sinks.iter_mut() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.emit(entry)));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[LOGGER WARNING] Sink '{}' failed: {}", sink.name(), e);
                    self.inner.metrics.record_sink_error();
                }
                Err(panic_info) => {
                    eprintln!(
                        "[LOGGER ERROR] Sink '{}' panicked: {}. \
                         Other sinks continue to function.",
                        sink.name(),
                        panic_message(&panic_info)
                    );
                    self.inner.metrics.record_sink_error();
                }
            }
        }
    }

    fn remote(&self) -> &CloudWatchBuffer {
        self.inner.remote.get_or_init(|| {
            CloudWatchBuffer::new(self.inner.remote_config.clone(), self.inner.shipper.clone())
        })
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.write(message, WriteOptions::new().with_level(level));
    }

    pub fn log_with_context(&self, level: LogLevel, message: impl Into<String>, context: LogContext) {
        self.write(
            message,
            WriteOptions::new().with_level(level).with_context(context),
        );
    }

    pub fn verbose(&self, message: impl Into<String>) {
        self.log(LogLevel::Verbose, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Information, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(LogLevel::Critical, message);
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.inner.min_level.write() = level;
    }

    pub fn min_level(&self) -> LogLevel {
        *self.inner.min_level.read()
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    pub fn add_sink(&self, sink: Box<dyn Sink>) {
        self.inner.sinks.write().push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.inner.sinks.read().len()
    }

    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// The correlation stack this logger reads and scopes push onto
    pub fn correlation(&self) -> CorrelationManager {
        match self.inner.correlation {
            Some(ref manager) => manager.clone(),
            None => CorrelationManager::current_thread(),
        }
    }

    /// Open a scope; see [`LogScope::start`]
    pub fn start_scope(&self, name: impl Into<String>, options: ScopeOptions) -> Result<LogScope> {
        LogScope::start(self, name, options)
    }

    /// Run `body` inside a scope; see [`super::scope::run_within_scope`]
    pub fn run_within_scope<T, E, F>(
        &self,
        name: impl Into<String>,
        options: ScopeOptions,
        body: F,
    ) -> std::result::Result<T, ScopeError<E>>
    where
        F: FnOnce(&LogScope) -> std::result::Result<T, E>,
        E: std::error::Error,
    {
        super::scope::run_within_scope(self, name, options, body)
    }

    /// Flush every sink, reporting the first failure
    pub fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for sink in self.inner.sinks.write().iter_mut() {
            if let Err(e) = sink.flush() {
                eprintln!("[LOGGER WARNING] Sink '{}' flush failed: {}", sink.name(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush the remote buffer on the calling thread
    ///
    /// Returns `None` when nothing was ever queued for the remote sink.
    pub fn flush_remote(&self, force: bool) -> Option<FlushReport> {
        self.inner.remote.get().map(|remote| remote.flush(force))
    }

    pub fn remote_buffer(&self) -> Option<&CloudWatchBuffer> {
        self.inner.remote.get()
    }

    pub fn remote_enabled(&self) -> bool {
        self.inner.remote_enabled
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.inner.metrics
    }

    /// Stop the remote flusher after a final forced flush, then flush sinks
    ///
    /// **Note**: When the last handle is dropped without calling `shutdown()`
    /// explicitly, [`DEFAULT_SHUTDOWN_TIMEOUT`] (5 seconds) is used.
    ///
    /// # Returns
    ///
    /// `true` if shutdown completed within the timeout, `false` otherwise
    ///
    /// # Example
    ///
    /// ```
    /// use fleet_log::Logger;
    /// use std::time::Duration;
    ///
    /// let logger = Logger::new();
    /// logger.info("Rollout complete");
    ///
    /// if !logger.shutdown(Duration::from_secs(10)) {
    ///     eprintln!("Warning: Logger shutdown timed out");
    /// }
    /// ```
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let mut completed = true;

        if let Some(remote) = self.inner.remote.get() {
            completed &= remote.shutdown(timeout);
        }

        if let Err(e) = self.flush() {
            eprintln!("[LOGGER ERROR] Failed to flush during shutdown: {}", e);
            completed = false;
        }

        completed
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoggerInner {
    fn drop(&mut self) {
        if let Some(remote) = self.remote.get() {
            remote.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);

            // Report any entries that never reached the remote sink
            let metrics = remote.metrics();
            if metrics.dropped() > 0 {
                eprintln!(
                    "[LOGGER WARNING] Logger shutting down with {} undelivered remote entries \
                     (drop rate: {:.2}%)",
                    metrics.dropped(),
                    metrics.drop_rate()
                );
            }
        }

        for sink in self.sinks.get_mut().iter_mut() {
            if let Err(e) = sink.flush() {
                eprintln!("[LOGGER ERROR] Failed to flush '{}' during shutdown: {}", sink.name(), e);
            }
        }
    }
}

/// Render a caught panic payload for diagnostics
pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use fleet_log::prelude::*;
/// use std::sync::Arc;
///
/// struct Discard;
///
/// impl LogShipper for Discard {
///     fn ship(&self, _group: &str, _events: &[RemoteEvent]) -> fleet_log::Result<()> {
///         Ok(())
///     }
/// }
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .remote_enabled(true)
///     .remote_config(BufferConfig::new().with_log_group("/fleet-ops/patching"))
///     .shipper(Arc::new(Discard))
///     .build();
/// ```
pub struct LoggerBuilder {
    min_level: LogLevel,
    sinks: Vec<Box<dyn Sink>>,
    module: String,
    remote_config: BufferConfig,
    remote_enabled: bool,
    shipper: Option<Arc<dyn LogShipper>>,
    correlation: Option<CorrelationManager>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::Information,
            sinks: Vec::new(),
            module: DEFAULT_MODULE.to_string(),
            remote_config: BufferConfig::default(),
            remote_enabled: false,
            shipper: None,
            correlation: None,
        }
    }

    /// Builder preloaded from configuration: console sink, file sink when a
    /// path is set, and remote buffer settings
    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Self::new()
            .min_level(config.minimum_level)
            .module(config.module_name.clone())
            .remote_config(config.remote_buffer_config())
            .remote_enabled(config.remote_logging_enabled)
            .sink(
                ConsoleSink::with_colors(config.use_colors)
                    .with_output_format(config.output_format),
            );

        if let Some(ref path) = config.log_file_path {
            builder = builder.sink(
                FileSink::new(path)
                    .with_max_bytes(config.max_file_bytes)
                    .with_compression(config.compress_archives),
            );
        }

        Ok(builder)
    }

    /// Set minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Add a sink
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Module name stamped into every entry's metadata
    #[must_use = "builder methods return a new value"]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn remote_config(mut self, config: BufferConfig) -> Self {
        self.remote_config = config;
        self
    }

    /// Queue every entry for the remote sink
    #[must_use = "builder methods return a new value"]
    pub fn remote_enabled(mut self, enabled: bool) -> Self {
        self.remote_enabled = enabled;
        self
    }

    /// Client used to deliver remote batches
    ///
    /// Without one, remote batches are drained and dropped.
    #[must_use = "builder methods return a new value"]
    pub fn shipper(mut self, shipper: Arc<dyn LogShipper>) -> Self {
        self.shipper = Some(shipper);
        self
    }

    /// Pin the logger to `manager` instead of each thread's ambient stack
    #[must_use = "builder methods return a new value"]
    pub fn correlation_manager(mut self, manager: CorrelationManager) -> Self {
        self.correlation = Some(manager);
        self
    }

    /// Build the Logger
    pub fn build(self) -> Logger {
        let inner = LoggerInner {
            min_level: RwLock::new(self.min_level),
            sinks: RwLock::new(self.sinks),
            remote: OnceLock::new(),
            remote_config: self.remote_config,
            shipper: self.shipper,
            remote_enabled: self.remote_enabled,
            correlation: self.correlation,
            module: self.module,
            metrics: LoggerMetrics::new(),
        };

        let logger = Logger {
            inner: Arc::new(inner),
        };
        if logger.inner.remote_enabled {
            logger.remote();
        }
        logger
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
