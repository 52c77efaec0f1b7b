//! Timestamp utilities
//!
//! The upstream feed reports battle times in a compact UTC form
//! (`20251013T235247.000Z`). The database stores fixed-width UTC text
//! (`2025-10-13T23:52:47.000Z`) so that lexical order matches time order.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Battle time format used by the upstream feed
pub const FEED_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.fZ";

/// Storage format for timestamps in the database
const DB_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an upstream battle time (`20251013T235247.000Z`) as UTC
pub fn parse_feed_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), FEED_TIME_FORMAT).map(|naive| naive.and_utc())
}

/// Format a timestamp for storage
pub fn to_db_string(ts: &DateTime<Utc>) -> String {
    ts.format(DB_TIME_FORMAT).to_string()
}

/// Parse a timestamp previously written by [`to_db_string`]
pub fn from_db_string(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.fZ").map(|naive| naive.and_utc())
}
