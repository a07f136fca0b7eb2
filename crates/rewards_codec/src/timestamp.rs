//! ISO-8601 timestamp parsing, preserved to millisecond resolution.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp is missing or not a string")]
    Missing,
    #[error("timestamp {0:?} could not be parsed as ISO-8601")]
    Unparseable(String),
}

/// Parse an ISO-8601 string with a time-zone offset into an absolute UTC
/// instant. Source time zones are normalized away here so that downstream
/// window comparisons never need to care where a record came from.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimestampError::Unparseable(raw.to_string()))
}

/// Render a UTC instant back to millisecond-precision RFC 3339, matching the
/// on-disk format produced by upstream. Only used by tests that need to
/// construct fixtures; production output always preserves the original
/// string verbatim (see `rewards_protocol::record::RewardedDecision`).
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
