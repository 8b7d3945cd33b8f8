//! Sink implementations

pub mod cloudwatch;
pub mod console;
pub mod file;

pub use cloudwatch::{BufferConfig, CloudWatchBuffer, FlushReport, LogShipper, RemoteEvent};
pub use console::ConsoleSink;
pub use file::FileSink;

pub use crate::core::Sink;
