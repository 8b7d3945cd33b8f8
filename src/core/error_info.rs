//! Capture of caller errors into log context

use super::log_context::LogContext;
use std::backtrace::{Backtrace, BacktraceStatus};

/// Reserved context keys written for an attached error
pub const EXCEPTION_TYPE_KEY: &str = "exceptionType";
pub const EXCEPTION_MESSAGE_KEY: &str = "exceptionMessage";
pub const STACK_TRACE_KEY: &str = "stackTrace";
pub const INNER_EXCEPTION_KEY: &str = "innerException";

/// Owned description of an error attached to a log call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub type_name: String,
    pub message: String,
    pub inner_message: Option<String>,
    pub stack_trace: Option<String>,
}

impl ErrorInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            inner_message: None,
            stack_trace: None,
        }
    }

    /// Describe `error`, including its direct source and a backtrace when
    /// `RUST_BACKTRACE` enables capture
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let backtrace = Backtrace::capture();
        let stack_trace = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            type_name: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            inner_message: error.source().map(|s| s.to_string()),
            stack_trace,
        }
    }

    #[must_use]
    pub fn with_inner_message(mut self, message: impl Into<String>) -> Self {
        self.inner_message = Some(message.into());
        self
    }

    /// Write the reserved keys into `context`, replacing existing values
    pub fn merge_into(&self, context: &mut LogContext) {
        context.add_field(EXCEPTION_TYPE_KEY, self.type_name.as_str());
        context.add_field(EXCEPTION_MESSAGE_KEY, self.message.as_str());
        if let Some(ref trace) = self.stack_trace {
            context.add_field(STACK_TRACE_KEY, trace.as_str());
        }
        if let Some(ref inner) = self.inner_message {
            context.add_field(INNER_EXCEPTION_KEY, inner.as_str());
        }
    }
}
