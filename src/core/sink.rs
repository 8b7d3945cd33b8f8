//! Sink trait for log output destinations

use super::{error::Result, log_entry::LogEntry};

/// A destination for emitted entries
///
/// Sinks receive each entry after filtering and enrichment. Errors returned
/// here never reach the caller of `Logger::write`; the pipeline reports them
/// on stderr and moves on to the next sink.
pub trait Sink: Send + Sync {
    fn emit(&mut self, entry: &LogEntry) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}
