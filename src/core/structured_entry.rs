//! Wire shape of the structured log line
//!
//! Field names and their order are consumed by downstream log-ingestion
//! tooling and must not change.

use super::log_context::LogContext;
use super::log_level::LogLevel;
use serde::{Deserialize, Serialize};

/// Borrowed view of an entry, serialized in field declaration order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StructuredLine<'a> {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_correlation_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a LogContext>,
    pub metadata: MetadataLine<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetadataLine<'a> {
    pub machine_name: &'a str,
    pub process_id: u32,
    pub username: &'a str,
    pub module: &'a str,
}

/// Owned form used when parsing a line back
///
/// `level` stays a string so an unknown name surfaces as `InvalidLevel`
/// rather than a generic format error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OwnedStructuredLine {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub parent_correlation_id: Option<String>,
    #[serde(default)]
    pub scope_name: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub script_name: Option<String>,
    #[serde(default)]
    pub context: Option<LogContext>,
    #[serde(default)]
    pub metadata: Option<OwnedMetadataLine>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct OwnedMetadataLine {
    pub machine_name: String,
    pub process_id: u32,
    pub username: String,
    pub module: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_key_order() {
        let ctx = LogContext::new().with_field("k", 1);
        let line = StructuredLine {
            timestamp: "2024-01-01T12:00:00.000Z".to_string(),
            level: LogLevel::Information,
            message: "hello",
            correlation_id: Some("c"),
            parent_correlation_id: Some("p"),
            scope_name: Some("s"),
            duration_ms: Some(1.5),
            function_name: Some("f"),
            script_name: Some("x.rs"),
            context: Some(&ctx),
            metadata: MetadataLine {
                machine_name: "host",
                process_id: 7,
                username: "ops",
                module: "fleet_log",
            },
        };

        let json = serde_json::to_string(&line).unwrap();
        assert_eq!(
            json,
            "{\"timestamp\":\"2024-01-01T12:00:00.000Z\",\"level\":\"Information\",\
             \"message\":\"hello\",\"correlationId\":\"c\",\"parentCorrelationId\":\"p\",\
             \"scopeName\":\"s\",\"durationMs\":1.5,\"functionName\":\"f\",\
             \"scriptName\":\"x.rs\",\"context\":{\"k\":1},\"metadata\":{\
             \"machineName\":\"host\",\"processId\":7,\"username\":\"ops\",\
             \"module\":\"fleet_log\"}}"
        );
    }

    #[test]
    fn test_partial_metadata_defaults() {
        let parsed: OwnedStructuredLine = serde_json::from_str(
            r#"{"timestamp":"t","level":"Debug","message":"m","metadata":{"username":"ops"}}"#,
        )
        .unwrap();
        let metadata = parsed.metadata.unwrap();
        assert_eq!(metadata.username, "ops");
        assert_eq!(metadata.process_id, 0);
        assert!(metadata.machine_name.is_empty());
    }
}
