//! Timestamp formatting utilities
//!
//! Every timestamp the core writes goes through this module so that the
//! structured form, the console form and the file archive names agree.

use super::error::{LoggerError, Result};
use chrono::{DateTime, Local, SubsecRound, Utc};

/// Structured-line timestamp: `2024-01-01T12:00:00.000Z`
pub const ISO8601_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Console timestamp in local time: `2024-01-01 12:00:00.000`
pub const CONSOLE_LOCAL: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Suffix used for rotated file archives
pub const ARCHIVE_SUFFIX: &str = "%Y%m%d%H%M%S";

/// Current UTC time truncated to millisecond precision
///
/// Entries carry millisecond timestamps so the structured form round-trips
/// without loss.
#[must_use]
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[must_use]
pub fn format_iso8601(datetime: &DateTime<Utc>) -> String {
    datetime.format(ISO8601_MILLIS).to_string()
}

#[must_use]
pub fn format_console(datetime: &DateTime<Utc>) -> String {
    datetime.with_timezone(&Local).format(CONSOLE_LOCAL).to_string()
}

#[must_use]
pub fn format_archive_suffix(datetime: &DateTime<Utc>) -> String {
    datetime.format(ARCHIVE_SUFFIX).to_string()
}

/// Parse an ISO-8601 / RFC 3339 timestamp into UTC
///
/// Offsets other than `Z` are accepted and normalized to UTC.
pub fn parse_iso8601(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| LoggerError::invalid_timestamp(value))
}
