//! Logger configuration
//!
//! A `LoggerConfig` can be built in code, parsed from the JSON settings file
//! shipped alongside automation scripts, and then adjusted from `FLEET_LOG_*`
//! environment variables.

use super::error::{LoggerError, Result};
use super::log_entry::DEFAULT_MODULE;
use super::log_level::LogLevel;
use super::output_format::OutputFormat;
use crate::sinks::cloudwatch::{
    BufferConfig, DEFAULT_BATCH_LIMIT, DEFAULT_BUFFER_THRESHOLD, DEFAULT_LOG_GROUP,
};
use crate::sinks::file::DEFAULT_MAX_FILE_BYTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_MIN_LEVEL: &str = "FLEET_LOG_MIN_LEVEL";
pub const ENV_FORMAT: &str = "FLEET_LOG_FORMAT";
pub const ENV_FILE: &str = "FLEET_LOG_FILE";
pub const ENV_REMOTE: &str = "FLEET_LOG_REMOTE";
pub const ENV_REMOTE_THRESHOLD: &str = "FLEET_LOG_REMOTE_THRESHOLD";
pub const ENV_GROUP: &str = "FLEET_LOG_GROUP";

const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerConfig {
    pub minimum_level: LogLevel,
    pub output_format: OutputFormat,
    pub log_file_path: Option<PathBuf>,
    pub remote_logging_enabled: bool,
    pub remote_buffer_threshold: usize,
    pub remote_log_group_name: String,
    pub remote_batch_limit: usize,
    pub remote_flush_interval_ms: u64,
    pub module_name: String,
    pub max_file_bytes: u64,
    pub compress_archives: bool,
    pub use_colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            minimum_level: LogLevel::Information,
            output_format: OutputFormat::Auto,
            log_file_path: None,
            remote_logging_enabled: false,
            remote_buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
            remote_log_group_name: DEFAULT_LOG_GROUP.to_string(),
            remote_batch_limit: DEFAULT_BATCH_LIMIT,
            remote_flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            module_name: DEFAULT_MODULE.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            compress_archives: false,
            use_colors: true,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON settings document
    ///
    /// Missing keys take their defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use fleet_log::{LoggerConfig, LogLevel};
    ///
    /// let config = LoggerConfig::from_json_str(
    ///     r#"{"minimumLevel": "Warning", "remoteBufferThreshold": 10}"#,
    /// ).unwrap();
    ///
    /// assert_eq!(config.minimum_level, LogLevel::Warning);
    /// assert_eq!(config.remote_buffer_threshold, 10);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawLoggerConfig =
            serde_json::from_str(json).map_err(|e| LoggerError::config("settings", e.to_string()))?;
        let config = raw.into_config()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "read logger settings",
                format!("Failed to read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&text)
    }

    /// Apply `FLEET_LOG_*` overrides from the process environment
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_MIN_LEVEL) {
            self.minimum_level = level.parse()?;
        }
        if let Some(format) = lookup(ENV_FORMAT) {
            self.output_format = format.parse()?;
        }
        if let Some(path) = lookup(ENV_FILE) {
            self.log_file_path = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(flag) = lookup(ENV_REMOTE) {
            self.remote_logging_enabled = parse_flag(ENV_REMOTE, &flag)?;
        }
        if let Some(threshold) = lookup(ENV_REMOTE_THRESHOLD) {
            self.remote_buffer_threshold = threshold.trim().parse().map_err(|_| {
                LoggerError::config(
                    ENV_REMOTE_THRESHOLD,
                    format!("'{}' is not a positive integer", threshold),
                )
            })?;
        }
        if let Some(group) = lookup(ENV_GROUP) {
            self.remote_log_group_name = group;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote_buffer_threshold == 0 {
            return Err(LoggerError::config(
                "remoteBufferThreshold",
                "must be at least 1",
            ));
        }
        if self.remote_batch_limit == 0 {
            return Err(LoggerError::config("remoteBatchLimit", "must be at least 1"));
        }
        if self.remote_flush_interval_ms == 0 {
            return Err(LoggerError::config(
                "remoteFlushIntervalMs",
                "must be at least 1",
            ));
        }
        if self.max_file_bytes == 0 {
            return Err(LoggerError::config("maxFileBytes", "must be at least 1"));
        }
        if self.module_name.trim().is_empty() {
            return Err(LoggerError::config("moduleName", "must not be empty"));
        }
        if self.remote_logging_enabled && self.remote_log_group_name.trim().is_empty() {
            return Err(LoggerError::config(
                "remoteLogGroupName",
                "required when remote logging is enabled",
            ));
        }
        Ok(())
    }

    pub fn remote_buffer_config(&self) -> BufferConfig {
        BufferConfig::new()
            .with_threshold(self.remote_buffer_threshold)
            .with_batch_limit(self.remote_batch_limit)
            .with_log_group(self.remote_log_group_name.clone())
            .with_flush_interval(Duration::from_millis(self.remote_flush_interval_ms))
    }
}

/// Settings document as written on disk; levels and formats stay strings so
/// their parse errors keep their own kinds
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawLoggerConfig {
    minimum_level: Option<String>,
    output_format: Option<String>,
    log_file_path: Option<PathBuf>,
    remote_logging_enabled: Option<bool>,
    remote_buffer_threshold: Option<usize>,
    remote_log_group_name: Option<String>,
    remote_batch_limit: Option<usize>,
    remote_flush_interval_ms: Option<u64>,
    module_name: Option<String>,
    max_file_bytes: Option<u64>,
    compress_archives: Option<bool>,
    use_colors: Option<bool>,
}

impl RawLoggerConfig {
    fn into_config(self) -> Result<LoggerConfig> {
        let defaults = LoggerConfig::default();
        Ok(LoggerConfig {
            minimum_level: match self.minimum_level {
                Some(level) => level.parse()?,
                None => defaults.minimum_level,
            },
            output_format: match self.output_format {
                Some(format) => format.parse()?,
                None => defaults.output_format,
            },
            log_file_path: self.log_file_path,
            remote_logging_enabled: self
                .remote_logging_enabled
                .unwrap_or(defaults.remote_logging_enabled),
            remote_buffer_threshold: self
                .remote_buffer_threshold
                .unwrap_or(defaults.remote_buffer_threshold),
            remote_log_group_name: self
                .remote_log_group_name
                .unwrap_or(defaults.remote_log_group_name),
            remote_batch_limit: self.remote_batch_limit.unwrap_or(defaults.remote_batch_limit),
            remote_flush_interval_ms: self
                .remote_flush_interval_ms
                .unwrap_or(defaults.remote_flush_interval_ms),
            module_name: self.module_name.unwrap_or(defaults.module_name),
            max_file_bytes: self.max_file_bytes.unwrap_or(defaults.max_file_bytes),
            compress_archives: self.compress_archives.unwrap_or(defaults.compress_archives),
            use_colors: self.use_colors.unwrap_or(defaults.use_colors),
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LoggerError::config(
            key,
            format!("'{}' is not a boolean", value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();
        assert_eq!(config.minimum_level, LogLevel::Information);
        assert_eq!(config.output_format, OutputFormat::Auto);
        assert!(config.log_file_path.is_none());
        assert!(!config.remote_logging_enabled);
        assert_eq!(config.remote_buffer_threshold, 25);
        assert_eq!(config.remote_log_group_name, "/fleet-ops/automation");
        assert_eq!(config.max_file_bytes, 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_str_camel_case() {
        let config = LoggerConfig::from_json_str(
            r#"{
                "minimumLevel": "Debug",
                "outputFormat": "Both",
                "logFilePath": "/tmp/fleet.log",
                "remoteLoggingEnabled": true,
                "remoteLogGroupName": "/fleet-ops/patching"
            }"#,
        )
        .unwrap();

        assert_eq!(config.minimum_level, LogLevel::Debug);
        assert_eq!(config.output_format, OutputFormat::Both);
        assert_eq!(config.log_file_path, Some(PathBuf::from("/tmp/fleet.log")));
        assert!(config.remote_logging_enabled);
        assert_eq!(config.remote_buffer_threshold, 25);
    }

    #[test]
    fn test_invalid_level_in_json() {
        let err = LoggerConfig::from_json_str(r#"{"minimumLevel": "Loud"}"#).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidLevel(_)), "got {:?}", err);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = LoggerConfig::from_json_str(r#"{"remoteBufferThreshold": 0}"#).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = LoggerConfig::from_json_str(r#"{"minimumLevle": "Debug"}"#).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_overrides() {
        let config = LoggerConfig::default()
            .apply_overrides_from(lookup(&[
                (ENV_MIN_LEVEL, "warn"),
                (ENV_FORMAT, "structured"),
                (ENV_REMOTE, "yes"),
                (ENV_REMOTE_THRESHOLD, "5"),
                (ENV_GROUP, "/fleet-ops/health"),
            ]))
            .unwrap();

        assert_eq!(config.minimum_level, LogLevel::Warning);
        assert_eq!(config.output_format, OutputFormat::Structured);
        assert!(config.remote_logging_enabled);
        assert_eq!(config.remote_buffer_threshold, 5);
        assert_eq!(config.remote_log_group_name, "/fleet-ops/health");
    }

    #[test]
    fn test_bad_overrides() {
        assert!(matches!(
            LoggerConfig::default().apply_overrides_from(lookup(&[(ENV_MIN_LEVEL, "chatty")])),
            Err(LoggerError::InvalidLevel(_))
        ));
        assert!(matches!(
            LoggerConfig::default().apply_overrides_from(lookup(&[(ENV_REMOTE, "maybe")])),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            LoggerConfig::default()
                .apply_overrides_from(lookup(&[(ENV_REMOTE_THRESHOLD, "0")])),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_remote_buffer_config() {
        let mut config = LoggerConfig::default();
        config.remote_buffer_threshold = 7;
        config.remote_flush_interval_ms = 250;

        let buffer = config.remote_buffer_config();
        assert_eq!(buffer.threshold, 7);
        assert_eq!(buffer.flush_interval, Duration::from_millis(250));
        assert_eq!(buffer.log_group, "/fleet-ops/automation");
    }
}
