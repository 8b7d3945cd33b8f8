//! Log entry structure

use super::error::{LoggerError, Result};
use super::log_context::LogContext;
use super::log_level::LogLevel;
use super::structured_entry::{MetadataLine, OwnedStructuredLine, StructuredLine};
use super::timestamp;
use chrono::{DateTime, Utc};
use std::sync::OnceLock;
use std::time::Duration;

/// Maximum message length in characters
pub const MAX_MESSAGE_LENGTH: usize = 262_144;

/// Width the upper-case level name is padded to in the console form
const CONSOLE_LEVEL_WIDTH: usize = 11;

/// Number of correlation id characters shown in the console form
const CONSOLE_CORRELATION_CHARS: usize = 8;

/// Module name used when an entry is built outside a configured logger
pub const DEFAULT_MODULE: &str = env!("CARGO_PKG_NAME");

static MACHINE_NAME: OnceLock<String> = OnceLock::new();
static USERNAME: OnceLock<String> = OnceLock::new();

/// Get cached machine name, resolving it on first access
fn machine_name() -> String {
    MACHINE_NAME
        .get_or_init(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .or_else(|| std::env::var("COMPUTERNAME").ok())
                .or_else(|| std::env::var("HOSTNAME").ok())
                .unwrap_or_else(|| "unknown".to_string())
        })
        .clone()
}

/// Get cached username, resolving it on first access
fn username() -> String {
    USERNAME
        .get_or_init(|| {
            std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string())
        })
        .clone()
}

/// Host and process metadata captured when an entry is constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    pub machine_name: String,
    pub process_id: u32,
    pub username: String,
    pub module: String,
}

impl EntryMetadata {
    /// Capture metadata for the current process
    pub fn capture(module: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name(),
            process_id: std::process::id(),
            username: username(),
            module: module.into(),
        }
    }
}

/// Reject empty, whitespace-only and over-length messages
pub fn validate_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(LoggerError::EmptyMessage);
    }
    let length = message.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(LoggerError::message_too_long(length, MAX_MESSAGE_LENGTH));
    }
    Ok(())
}

/// Escape control characters so a message always renders on one line
fn sanitize_message(message: &str) -> String {
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

fn round_millis(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

/// One emitted log event
///
/// Entries are validated at construction and are not mutated once they have
/// been handed to a sink; the `with_*` builders consume the entry and are
/// meant to be used while assembling it. `Clone` gives a deep copy.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: String,
    correlation_id: Option<String>,
    parent_correlation_id: Option<String>,
    scope_name: Option<String>,
    duration_ms: Option<f64>,
    context: LogContext,
    metadata: EntryMetadata,
    function_name: Option<String>,
    script_name: Option<String>,
}

impl LogEntry {
    /// Build an entry, capturing the timestamp and host metadata now
    ///
    /// # Errors
    ///
    /// Returns `EmptyMessage` or `MessageTooLong` when the message fails
    /// validation.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Result<Self> {
        Self::with_module(level, message, DEFAULT_MODULE)
    }

    /// Build an entry reporting `module` in its metadata
    pub fn with_module(
        level: LogLevel,
        message: impl Into<String>,
        module: impl Into<String>,
    ) -> Result<Self> {
        let message = message.into();
        validate_message(&message)?;

        Ok(Self {
            timestamp: timestamp::now_millis(),
            level,
            message,
            correlation_id: None,
            parent_correlation_id: None,
            scope_name: None,
            duration_ms: None,
            context: LogContext::new(),
            metadata: EntryMetadata::capture(module),
            function_name: None,
            script_name: None,
        })
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_parent_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.parent_correlation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_scope_name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_secs_f64() * 1000.0);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = Some(name.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn parent_correlation_id(&self) -> Option<&str> {
        self.parent_correlation_id.as_deref()
    }

    pub fn scope_name(&self) -> Option<&str> {
        self.scope_name.as_deref()
    }

    /// Duration in milliseconds, set on scope exit entries
    pub fn duration_ms(&self) -> Option<f64> {
        self.duration_ms
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    pub fn script_name(&self) -> Option<&str> {
        self.script_name.as_deref()
    }

    /// Serialize to the single-line structured (JSON) form
    pub fn serialize_structured(&self) -> Result<String> {
        let line = StructuredLine {
            timestamp: timestamp::format_iso8601(&self.timestamp),
            level: self.level,
            message: &self.message,
            correlation_id: self.correlation_id.as_deref(),
            parent_correlation_id: self.parent_correlation_id.as_deref(),
            scope_name: self.scope_name.as_deref(),
            duration_ms: self.duration_ms.map(round_millis),
            function_name: self.function_name.as_deref(),
            script_name: self.script_name.as_deref(),
            context: (!self.context.is_empty()).then_some(&self.context),
            metadata: MetadataLine {
                machine_name: &self.metadata.machine_name,
                process_id: self.metadata.process_id,
                username: &self.metadata.username,
                module: &self.metadata.module,
            },
        };
        Ok(serde_json::to_string(&line)?)
    }

    /// Parse an entry back from its structured form
    ///
    /// # Errors
    ///
    /// `InvalidFormat` when the text is not a structured line,
    /// `InvalidTimestamp` when the timestamp is not ISO-8601 and
    /// `InvalidLevel` when the level name is unknown.
    pub fn deserialize(text: &str) -> Result<Self> {
        let line: OwnedStructuredLine =
            serde_json::from_str(text).map_err(|e| LoggerError::invalid_format(e.to_string()))?;

        let timestamp = timestamp::parse_iso8601(&line.timestamp)?;
        let level: LogLevel = line.level.parse()?;
        validate_message(&line.message)?;

        if let Some(ms) = line.duration_ms {
            if !ms.is_finite() || ms < 0.0 {
                return Err(LoggerError::invalid_format(format!(
                    "durationMs must be a non-negative number, got {}",
                    ms
                )));
            }
        }

        let metadata = line.metadata.unwrap_or_default();
        Ok(Self {
            timestamp,
            level,
            message: line.message,
            correlation_id: line.correlation_id,
            parent_correlation_id: line.parent_correlation_id,
            scope_name: line.scope_name,
            duration_ms: line.duration_ms,
            context: line.context.unwrap_or_default(),
            metadata: EntryMetadata {
                machine_name: metadata.machine_name,
                process_id: metadata.process_id,
                username: metadata.username,
                module: metadata.module,
            },
            function_name: line.function_name,
            script_name: line.script_name,
        })
    }

    /// Render the human-readable single-line form
    pub fn serialize_console(&self) -> String {
        self.render_console(|level| level)
    }

    /// Render the console form, letting the caller decorate the padded level
    pub(crate) fn render_console<F>(&self, decorate_level: F) -> String
    where
        F: FnOnce(String) -> String,
    {
        let level = format!("{:>width$}", self.level.to_upper(), width = CONSOLE_LEVEL_WIDTH);
        let mut line = format!(
            "[{}] [{}] ",
            timestamp::format_console(&self.timestamp),
            decorate_level(level)
        );

        if let Some(ref id) = self.correlation_id {
            let short: String = id.chars().take(CONSOLE_CORRELATION_CHARS).collect();
            line.push_str(&format!("[{}] ", short));
        }

        line.push_str(&sanitize_message(&self.message));

        if let Some(ref scope) = self.scope_name {
            line.push_str(&format!(" [Scope: {}]", scope));
        }
        if let Some(ms) = self.duration_ms {
            line.push_str(&format!(" [Duration: {:.2}ms]", ms));
        }
        if !self.context.is_empty() {
            line.push_str(&format!(" {{{}}}", sanitize_message(&self.context.format_fields())));
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_context::FieldValue;

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(matches!(
            LogEntry::new(LogLevel::Information, ""),
            Err(LoggerError::EmptyMessage)
        ));
        assert!(matches!(
            LogEntry::new(LogLevel::Information, "  \t\n"),
            Err(LoggerError::EmptyMessage)
        ));
    }

    #[test]
    fn test_length_boundary() {
        let exact = "a".repeat(MAX_MESSAGE_LENGTH);
        assert!(LogEntry::new(LogLevel::Information, exact).is_ok());

        let over = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        match LogEntry::new(LogLevel::Information, over) {
            Err(LoggerError::MessageTooLong { length, max }) => {
                assert_eq!(length, MAX_MESSAGE_LENGTH + 1);
                assert_eq!(max, MAX_MESSAGE_LENGTH);
            }
            other => panic!("expected MessageTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let multibyte = "é".repeat(MAX_MESSAGE_LENGTH);
        assert!(LogEntry::new(LogLevel::Debug, multibyte).is_ok());
    }

    #[test]
    fn test_metadata_captured_at_construction() {
        let entry = LogEntry::with_module(LogLevel::Information, "hello", "FleetHealth").unwrap();
        assert_eq!(entry.metadata().process_id, std::process::id());
        assert_eq!(entry.metadata().module, "FleetHealth");
        assert!(!entry.metadata().machine_name.is_empty());
    }

    #[test]
    fn test_structured_field_order_and_omissions() {
        let entry = LogEntry::new(LogLevel::Warning, "disk low").unwrap();
        let json = entry.serialize_structured().unwrap();

        assert!(json.starts_with("{\"timestamp\":\""));
        let level_pos = json.find("\"level\"").unwrap();
        let message_pos = json.find("\"message\"").unwrap();
        let metadata_pos = json.find("\"metadata\"").unwrap();
        assert!(level_pos < message_pos && message_pos < metadata_pos);

        assert!(!json.contains("correlationId"));
        assert!(!json.contains("scopeName"));
        assert!(!json.contains("durationMs"));
        assert!(!json.contains("\"context\""));
    }

    #[test]
    fn test_structured_full_shape() {
        let entry = LogEntry::new(LogLevel::Error, "patch failed")
            .unwrap()
            .with_correlation_id("abc12345-6789")
            .with_parent_correlation_id("root-1")
            .with_scope_name("PatchRollout")
            .with_duration(Duration::from_micros(1_234_567))
            .with_function_name("invoke_patch")
            .with_script_name("patching.rs")
            .with_context(LogContext::new().with_field("instance", "i-1"));

        let value: serde_json::Value =
            serde_json::from_str(&entry.serialize_structured().unwrap()).unwrap();
        assert_eq!(value["level"], "Error");
        assert_eq!(value["correlationId"], "abc12345-6789");
        assert_eq!(value["parentCorrelationId"], "root-1");
        assert_eq!(value["scopeName"], "PatchRollout");
        assert_eq!(value["durationMs"], 1234.57);
        assert_eq!(value["functionName"], "invoke_patch");
        assert_eq!(value["scriptName"], "patching.rs");
        assert_eq!(value["context"]["instance"], "i-1");
        assert!(value["metadata"]["machineName"].is_string());
        assert!(value["metadata"]["processId"].is_number());
        assert!(value["metadata"]["username"].is_string());
        assert_eq!(value["metadata"]["module"], DEFAULT_MODULE);
    }

    #[test]
    fn test_roundtrip() {
        let entry = LogEntry::new(LogLevel::Information, "rollout complete")
            .unwrap()
            .with_correlation_id("corr-1")
            .with_scope_name("Rollout")
            .with_context(
                LogContext::new()
                    .with_field("succeeded", 12)
                    .with_field("ratio", 0.75)
                    .with_field("hosts", vec!["a", "b"]),
            );

        let parsed = LogEntry::deserialize(&entry.serialize_structured().unwrap()).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_roundtrip_rounds_duration() {
        let entry = LogEntry::new(LogLevel::Information, "exit")
            .unwrap()
            .with_duration(Duration::from_nanos(12_345_678));
        let parsed = LogEntry::deserialize(&entry.serialize_structured().unwrap()).unwrap();
        let delta = (parsed.duration_ms().unwrap() - entry.duration_ms().unwrap()).abs();
        assert!(delta <= 0.005 + f64::EPSILON, "delta was {}", delta);
    }

    #[test]
    fn test_deserialize_errors() {
        assert!(matches!(
            LogEntry::deserialize("not json"),
            Err(LoggerError::InvalidFormat(_))
        ));
        assert!(matches!(
            LogEntry::deserialize(r#"{"level":"Information","message":"x"}"#),
            Err(LoggerError::InvalidFormat(_))
        ));
        assert!(matches!(
            LogEntry::deserialize(
                r#"{"timestamp":"yesterday","level":"Information","message":"x"}"#
            ),
            Err(LoggerError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            LogEntry::deserialize(
                r#"{"timestamp":"2024-01-01T12:00:00.000Z","level":"Chatty","message":"x"}"#
            ),
            Err(LoggerError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_deserialize_defaults_optional_fields() {
        let entry = LogEntry::deserialize(
            r#"{"timestamp":"2024-01-01T12:00:00.000Z","level":"Debug","message":"x","extra":1}"#,
        )
        .unwrap();
        assert_eq!(entry.level(), LogLevel::Debug);
        assert!(entry.correlation_id().is_none());
        assert!(entry.context().is_empty());
        assert_eq!(entry.metadata().process_id, 0);
        assert_eq!(entry.metadata().module, "");
    }

    #[test]
    fn test_console_format_segments() {
        let entry = LogEntry::new(LogLevel::Warning, "slow response")
            .unwrap()
            .with_correlation_id("0123456789abcdef")
            .with_scope_name("HealthCheck")
            .with_duration(Duration::from_millis(1500))
            .with_context(LogContext::new().with_field("host", "web-1").with_field("code", 504));

        let line = entry.serialize_console();
        assert!(line.contains("] [    WARNING] [01234567] slow response"));
        assert!(line.ends_with(" [Scope: HealthCheck] [Duration: 1500.00ms] {host=web-1, code=504}"));
    }

    #[test]
    fn test_console_format_minimal() {
        let entry = LogEntry::new(LogLevel::Information, "ready").unwrap();
        let line = entry.serialize_console();
        assert!(line.ends_with("] [INFORMATION] ready"));
        assert!(!line.contains("Scope:"));
        assert!(!line.contains('{'));
    }

    #[test]
    fn test_console_is_single_line() {
        let entry = LogEntry::new(LogLevel::Information, "line one\nFAKE ERROR").unwrap();
        let line = entry.serialize_console();
        assert_eq!(line.lines().count(), 1);
        assert!(line.contains("line one\\nFAKE ERROR"));
        // The stored message itself is untouched
        assert_eq!(entry.message(), "line one\nFAKE ERROR");
    }

    #[test]
    fn test_clone_is_deep() {
        let entry = LogEntry::new(LogLevel::Information, "x")
            .unwrap()
            .with_context(LogContext::new().with_field("k", "v"));
        let copy = entry.clone();
        let changed = copy.with_context(LogContext::new().with_field("k", "other"));
        assert_eq!(
            entry.context().get("k"),
            Some(&FieldValue::String("v".to_string()))
        );
        assert_ne!(changed, entry);
    }
}
