//! Console sink

use crate::core::{LogEntry, LogLevel, OutputFormat, Result, Sink};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::Write;

pub struct ConsoleSink {
    use_colors: bool,
    output_format: OutputFormat,
}

impl ConsoleSink {
    /// Console sink with colors and the `Auto` format resolved against stdout
    pub fn new() -> Self {
        Self {
            use_colors: true,
            output_format: OutputFormat::Auto.resolve(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    /// Set the output format for this sink
    ///
    /// `Auto` is resolved immediately.
    ///
    /// # Example
    ///
    /// ```
    /// use fleet_log::sinks::ConsoleSink;
    /// use fleet_log::OutputFormat;
    ///
    /// let sink = ConsoleSink::new().with_output_format(OutputFormat::Both);
    /// assert_eq!(sink.output_format(), OutputFormat::Both);
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format.resolve();
        self
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Lines written for one entry, in output order
    pub fn format_lines(&self, entry: &LogEntry) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(2);
        if self.output_format.includes_structured() {
            lines.push(entry.serialize_structured()?);
        }
        if self.output_format.includes_console() {
            lines.push(self.format_human(entry));
        }
        Ok(lines)
    }

    #[cfg(feature = "console")]
    fn format_human(&self, entry: &LogEntry) -> String {
        if self.use_colors {
            let color = entry.level().color_code();
            entry.render_console(|level| level.color(color).to_string())
        } else {
            entry.serialize_console()
        }
    }

    #[cfg(not(feature = "console"))]
    fn format_human(&self, entry: &LogEntry) -> String {
        entry.serialize_console()
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn emit(&mut self, entry: &LogEntry) -> Result<()> {
        let lines = self.format_lines(entry)?;

        // Route Error and Critical levels to stderr, others to stdout
        match entry.level() {
            LogLevel::Error | LogLevel::Critical => {
                let mut err = std::io::stderr().lock();
                for line in &lines {
                    writeln!(err, "{}", line)?;
                }
            }
            _ => {
                let mut out = std::io::stdout().lock();
                for line in &lines {
                    writeln!(out, "{}", line)?;
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Flush both stdout and stderr since we write to both
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LogEntry {
        LogEntry::new(LogLevel::Warning, "disk at 91%")
            .unwrap()
            .with_correlation_id("1a2b3c4d-0000-4000-8000-000000000000")
    }

    #[test]
    fn test_both_emits_structured_then_human() {
        let sink = ConsoleSink::with_colors(false).with_output_format(OutputFormat::Both);
        let lines = sink.format_lines(&entry()).unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('{'));
        assert!(lines[1].contains("[    WARNING] [1a2b3c4d] disk at 91%"));
    }

    #[test]
    fn test_structured_only() {
        let sink = ConsoleSink::new().with_output_format(OutputFormat::Structured);
        let lines = sink.format_lines(&entry()).unwrap();

        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["level"], "Warning");
    }

    #[test]
    fn test_plain_console_has_no_escape_codes() {
        let sink = ConsoleSink::with_colors(false).with_output_format(OutputFormat::Console);
        let lines = sink.format_lines(&entry()).unwrap();
        assert!(!lines[0].contains('\u{1b}'));
    }

    #[test]
    fn test_auto_is_resolved() {
        let sink = ConsoleSink::new();
        assert_ne!(sink.output_format(), OutputFormat::Auto);
    }
}
