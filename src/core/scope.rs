//! Timed, correlated units of work
//!
//! A `LogScope` pushes its own correlation context when it starts and removes
//! exactly that context when it is disposed, logging an entry line and an exit
//! line with the elapsed time. Disposal happens once, whether it comes from an
//! explicit [`LogScope::dispose`], from `Drop`, or from several threads at
//! the same time.

use super::{
    correlation::{generate_correlation_id, CorrelationContext, CorrelationManager, CorrelationPrefix},
    error::{LoggerError, Result},
    error_info::ErrorInfo,
    log_context::{FieldValue, LogContext},
    log_level::LogLevel,
    logger::{panic_message, Logger, WriteOptions},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Context key carrying the enclosing scope's id on the entry line
pub const PARENT_CORRELATION_KEY: &str = "parentCorrelationId";

type ExitCallback = Box<dyn FnOnce(&ScopeHandle) + Send>;

/// Options for [`LogScope::start`]
#[derive(Default)]
pub struct ScopeOptions {
    pub context: LogContext,
    /// Use this id instead of generating one
    pub correlation_id: Option<String>,
    /// Prefix for a generated id
    pub prefix: Option<CorrelationPrefix>,
    /// Level of the entry and exit lines
    pub level: LogLevel,
    pub suppress_entry_log: bool,
    pub suppress_exit_log: bool,
    on_exit: Option<ExitCallback>,
}

impl ScopeOptions {
    pub fn new() -> Self {
        Self::default()
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

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_prefix(mut self, prefix: CorrelationPrefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn suppress_entry_log(mut self) -> Self {
        self.suppress_entry_log = true;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn suppress_exit_log(mut self) -> Self {
        self.suppress_exit_log = true;
        self
    }

    /// Run `callback` once, after the exit line, when the scope is disposed
    ///
    /// A panic inside the callback is caught and reported on stderr.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn on_exit<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&ScopeHandle) + Send + 'static,
    {
        self.on_exit = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for ScopeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeOptions")
            .field("context", &self.context)
            .field("correlation_id", &self.correlation_id)
            .field("prefix", &self.prefix)
            .field("level", &self.level)
            .field("suppress_entry_log", &self.suppress_entry_log)
            .field("suppress_exit_log", &self.suppress_exit_log)
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

struct ScopeState {
    name: String,
    correlation_id: String,
    parent_correlation_id: Option<String>,
    start_time: DateTime<Utc>,
    started: Instant,
    disposed: AtomicBool,
    end: OnceLock<(DateTime<Utc>, Duration)>,
    context: Mutex<LogContext>,
}

impl ScopeState {
    fn elapsed(&self) -> Duration {
        match self.end.get() {
            Some((_, elapsed)) => *elapsed,
            None => self.started.elapsed(),
        }
    }
}

/// Read-only view of a scope that may outlive it
#[derive(Clone)]
pub struct ScopeHandle {
    state: Arc<ScopeState>,
}

impl ScopeHandle {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn correlation_id(&self) -> &str {
        &self.state.correlation_id
    }

    pub fn parent_correlation_id(&self) -> Option<&str> {
        self.state.parent_correlation_id.as_deref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.state.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.state.end.get().map(|(end, _)| *end)
    }

    /// Time since start while live; frozen at disposal
    pub fn elapsed(&self) -> Duration {
        self.state.elapsed()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::Acquire)
    }

    /// Snapshot of the scope's context
    pub fn context(&self) -> LogContext {
        self.state.context.lock().clone()
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("name", &self.state.name)
            .field("correlation_id", &self.state.correlation_id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A live scope; disposes itself on drop
///
/// # Example
///
/// ```
/// use fleet_log::{Logger, LogScope, ScopeOptions};
///
/// let logger = Logger::new();
/// let outer = LogScope::start(&logger, "Rollout", ScopeOptions::new()).unwrap();
/// {
///     let inner = logger.start_scope("Reboot", ScopeOptions::new()).unwrap();
///     assert_eq!(inner.parent_correlation_id(), Some(outer.correlation_id()));
/// }
/// assert_eq!(logger.correlation().current().as_deref(), Some(outer.correlation_id()));
/// ```
pub struct LogScope {
    state: Arc<ScopeState>,
    logger: Logger,
    /// Stack this scope was pushed on, whichever thread disposes it
    manager: CorrelationManager,
    level: LogLevel,
    suppress_exit_log: bool,
    on_exit: Mutex<Option<ExitCallback>>,
}

impl LogScope {
    /// Start a scope and make its correlation id current
    ///
    /// The id is the explicit one from `options` if given, otherwise a new id
    /// whose parent is the current correlation (if any).
    ///
    /// # Errors
    ///
    /// Returns `EmptyScopeName` when `name` is empty or whitespace.
    pub fn start(logger: &Logger, name: impl Into<String>, options: ScopeOptions) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LoggerError::EmptyScopeName);
        }

        let ScopeOptions {
            context,
            correlation_id,
            prefix,
            level,
            suppress_entry_log,
            suppress_exit_log,
            on_exit,
        } = options;

        let manager = logger.correlation();
        let current = manager.current();
        let (correlation_id, parent_correlation_id) = match correlation_id {
            Some(id) => {
                let parent = current.filter(|c| *c != id);
                (id, parent)
            }
            None => (generate_correlation_id(prefix.as_ref()), current),
        };

        manager.push(
            CorrelationContext::new(correlation_id.clone(), parent_correlation_id.clone())
                .with_scope_name(name.clone()),
        );

        let state = Arc::new(ScopeState {
            name,
            correlation_id,
            parent_correlation_id,
            start_time: Utc::now(),
            started: Instant::now(),
            disposed: AtomicBool::new(false),
            end: OnceLock::new(),
            context: Mutex::new(context),
        });

        let scope = Self {
            state,
            logger: logger.clone(),
            manager,
            level,
            suppress_exit_log,
            on_exit: Mutex::new(on_exit),
        };

        if !suppress_entry_log {
            scope.log_entry_line();
        }

        Ok(scope)
    }

    fn log_entry_line(&self) {
        let mut context = self.state.context.lock().clone();
        if let Some(ref parent) = self.state.parent_correlation_id {
            context.add_field(PARENT_CORRELATION_KEY, parent.as_str());
        }

        self.logger.write(
            format!("Entering scope: {}", self.state.name),
            WriteOptions::new()
                .with_level(self.level)
                .with_context(context)
                .with_correlation_id(self.state.correlation_id.clone()),
        );
    }

    fn log_exit_line(&self, elapsed: Duration) {
        let mut options = WriteOptions::new()
            .with_level(self.level)
            .with_context(self.state.context.lock().clone())
            .with_correlation_id(self.state.correlation_id.clone());
        // The context is already off the stack, so carry scope data explicitly
        options.scope_name = Some(self.state.name.clone());
        options.parent_correlation_id = self.state.parent_correlation_id.clone();
        options.duration = Some(elapsed);

        self.logger
            .write(format!("Exiting scope: {}", self.state.name), options);
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn correlation_id(&self) -> &str {
        &self.state.correlation_id
    }

    pub fn parent_correlation_id(&self) -> Option<&str> {
        self.state.parent_correlation_id.as_deref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.state.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.state.end.get().map(|(end, _)| *end)
    }

    /// Time since start while live; frozen at disposal
    pub fn elapsed(&self) -> Duration {
        self.state.elapsed()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::Acquire)
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn handle(&self) -> ScopeHandle {
        ScopeHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Add or replace a context field carried by the exit line
    ///
    /// Returns `false` and changes nothing once the scope is disposed.
    pub fn add_context<K, V>(&self, key: K, value: V) -> bool
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut context = self.state.context.lock();
        if self.is_disposed() {
            return false;
        }
        context.add_field(key, value);
        true
    }

    /// End the scope; only the first call has any effect
    pub fn dispose(&self) {
        if self
            .state
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let elapsed = self.state.started.elapsed();
        let _ = self.state.end.set((Utc::now(), elapsed));

        self.manager.remove(&self.state.correlation_id);

        if !self.suppress_exit_log {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                self.log_exit_line(elapsed)
            }));
            if let Err(panic_info) = result {
                eprintln!(
                    "[LOGGER WARNING] Exit log for scope '{}' panicked: {}",
                    self.state.name,
                    panic_message(&panic_info)
                );
            }
        }

        if let Some(callback) = self.on_exit.lock().take() {
            let handle = self.handle();
            let result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || callback(&handle)));
            if let Err(panic_info) = result {
                eprintln!(
                    "[LOGGER WARNING] Exit callback for scope '{}' panicked: {}",
                    self.state.name,
                    panic_message(&panic_info)
                );
            }
        }
    }
}

impl Drop for LogScope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogScope")
            .field("name", &self.state.name)
            .field("correlation_id", &self.state.correlation_id)
            .field("parent_correlation_id", &self.state.parent_correlation_id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Failure of [`run_within_scope`]
#[derive(Debug)]
pub enum ScopeError<E> {
    /// The scope could not be started; the body never ran
    Start(LoggerError),
    /// The body returned an error
    Body(E),
}

impl<E> ScopeError<E> {
    pub fn into_body(self) -> Option<E> {
        match self {
            ScopeError::Body(e) => Some(e),
            ScopeError::Start(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for ScopeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::Start(e) => write!(f, "Failed to start scope: {}", e),
            ScopeError::Body(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ScopeError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScopeError::Start(e) => Some(e),
            ScopeError::Body(e) => e.source(),
        }
    }
}

/// Run `body` inside a new scope, disposing it on every exit path
///
/// An error from `body` is logged at `Error` with its type and message in
/// context, then returned as [`ScopeError::Body`]. A panic in `body` unwinds
/// through the scope, which disposes it.
///
/// # Example
///
/// ```
/// use fleet_log::{run_within_scope, Logger, ScopeOptions};
///
/// let logger = Logger::new();
/// let patched = run_within_scope(&logger, "ApplyPatches", ScopeOptions::new(), |scope| {
///     scope.add_context("instanceCount", 12);
///     Ok::<_, std::io::Error>(12)
/// })
/// .unwrap();
/// assert_eq!(patched, 12);
/// ```
pub fn run_within_scope<T, E, F>(
    logger: &Logger,
    name: impl Into<String>,
    options: ScopeOptions,
    body: F,
) -> std::result::Result<T, ScopeError<E>>
where
    F: FnOnce(&LogScope) -> std::result::Result<T, E>,
    E: std::error::Error,
{
    let scope = LogScope::start(logger, name, options).map_err(ScopeError::Start)?;
    let result = body(&scope);

    if let Err(ref e) = result {
        logger.write(
            format!("Scope '{}' failed with error", scope.name()),
            WriteOptions::new()
                .with_level(LogLevel::Error)
                .with_correlation_id(scope.correlation_id())
                .with_error_info(ErrorInfo::from_error(e)),
        );
    }

    scope.dispose();
    result.map_err(ScopeError::Body)
}
