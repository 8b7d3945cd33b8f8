//! Output format configuration for the console sink
//!
//! - Console: Human-readable single line
//! - Structured: The JSON line downstream ingestion consumes
//! - Both: Structured line followed by the human line
//! - Auto: Console on an interactive terminal, Structured otherwise

use super::error::LoggerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pick Console or Structured from the attached stdout
    #[default]
    Auto,

    /// Example: `{"timestamp":"2025-01-08T10:30:45.123Z","level":"Information",...}`
    Structured,

    /// Example: `[2025-01-08 10:30:45.123] [INFORMATION] [1a2b3c4d] Request processed`
    Console,

    Both,
}

impl OutputFormat {
    /// Resolve `Auto` against the current stdout
    #[must_use]
    pub fn resolve(self) -> OutputFormat {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Console,
            OutputFormat::Auto => OutputFormat::Structured,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Auto => "Auto",
            OutputFormat::Structured => "Structured",
            OutputFormat::Console => "Console",
            OutputFormat::Both => "Both",
        }
    }

    pub fn includes_structured(&self) -> bool {
        matches!(self, OutputFormat::Structured | OutputFormat::Both)
    }

    pub fn includes_console(&self) -> bool {
        matches!(self, OutputFormat::Console | OutputFormat::Both)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(OutputFormat::Auto),
            "structured" | "json" => Ok(OutputFormat::Structured),
            "console" | "text" => Ok(OutputFormat::Console),
            "both" => Ok(OutputFormat::Both),
            _ => Err(LoggerError::config(
                "outputFormat",
                format!("unknown output format '{}'", s),
            )),
        }
    }
}

impl Serialize for OutputFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Auto);
    }

    #[test]
    fn test_parse() {
        assert_eq!("both".parse::<OutputFormat>().unwrap(), OutputFormat::Both);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Structured);
        assert!(matches!(
            "xml".parse::<OutputFormat>(),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_resolve_keeps_explicit_formats() {
        assert_eq!(OutputFormat::Both.resolve(), OutputFormat::Both);
        assert_ne!(OutputFormat::Auto.resolve(), OutputFormat::Auto);
    }

    #[test]
    fn test_includes() {
        assert!(OutputFormat::Both.includes_console());
        assert!(OutputFormat::Both.includes_structured());
        assert!(!OutputFormat::Console.includes_structured());
        assert!(!OutputFormat::Structured.includes_console());
    }
}
