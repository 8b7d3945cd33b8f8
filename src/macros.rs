//! Logging macros for ergonomic log message formatting.
//!
//! These macros format like `format!` and record the calling function and
//! source file as `functionName` and `scriptName` on the entry.
//!
//! # Examples
//!
//! ```
//! use fleet_log::prelude::*;
//! use fleet_log::info;
//!
//! let logger = Logger::new();
//!
//! // Basic logging
//! info!(logger, "Rollout started");
//!
//! // With format arguments
//! let batch = 3;
//! info!(logger, "Patching batch {} of {}", batch, 10);
//! ```

/// Path of the enclosing function, without closure suffixes
///
/// # Examples
///
/// ```
/// fn reboot_instance() -> &'static str {
///     fleet_log::current_function!()
/// }
///
/// assert!(reboot_instance().ends_with("reboot_instance"));
/// ```
#[macro_export]
macro_rules! current_function {
    () => {{
        fn __fleet_log_marker() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = __type_name_of(__fleet_log_marker);
        let name = name.strip_suffix("::__fleet_log_marker").unwrap_or(name);
        name.trim_end_matches("::{{closure}}")
    }};
}

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use fleet_log::prelude::*;
/// # let logger = Logger::new();
/// use fleet_log::log;
/// log!(logger, LogLevel::Information, "Simple message");
/// log!(logger, LogLevel::Error, "Exit code: {}", 3010);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.write(
            ::std::format!($($arg)+),
            $crate::WriteOptions::new()
                .with_level($level)
                .with_function_name($crate::current_function!())
                .with_script_name(::std::file!()),
        )
    };
}

/// Log a verbose-level message.
///
/// # Examples
///
/// ```
/// # use fleet_log::prelude::*;
/// # let logger = Logger::new();
/// # logger.set_min_level(LogLevel::Verbose);
/// use fleet_log::verbose;
/// verbose!(logger, "Polling SSM command {}", "cmd-123");
/// ```
#[macro_export]
macro_rules! verbose {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Verbose, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an information-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Information, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// # use fleet_log::prelude::*;
/// # let logger = Logger::new();
/// use fleet_log::warning;
/// warning!(logger, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warning, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level message.
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{LogEntry, Logger, LogLevel, Result, Sink};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CaptureSink(Arc<Mutex<Vec<LogEntry>>>);

    impl Sink for CaptureSink {
        fn emit(&mut self, entry: &LogEntry) -> Result<()> {
            self.0.lock().push(entry.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "capture"
        }
    }

    #[test]
    fn test_current_function() {
        let name = crate::current_function!();
        assert!(name.ends_with("test_current_function"), "got {}", name);

        let in_closure = (|| crate::current_function!())();
        assert!(in_closure.ends_with("test_current_function"), "got {}", in_closure);
    }

    #[test]
    fn test_macros_record_call_site() {
        let capture = CaptureSink::default();
        let logger = Logger::builder()
            .min_level(LogLevel::Verbose)
            .sink(capture.clone())
            .build();

        crate::verbose!(logger, "v");
        crate::debug!(logger, "d");
        crate::info!(logger, "instance {}", "i-0abc");
        crate::warning!(logger, "w");
        crate::error!(logger, "e");
        crate::critical!(logger, "c");

        let entries = capture.0.lock();
        let levels: Vec<LogLevel> = entries.iter().map(|e| e.level()).collect();
        assert_eq!(levels, LogLevel::ALL.to_vec());
        assert_eq!(entries[2].message(), "instance i-0abc");
        assert!(entries[2]
            .function_name()
            .unwrap()
            .ends_with("test_macros_record_call_site"));
        assert_eq!(entries[2].script_name(), Some(file!()));
    }
}
