//! Timestamp parsing for user-supplied date literals.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parses a date literal into a BSON datetime. Accepted forms: RFC 3339
/// (`2016-01-01T00:00:00Z`, offsets allowed), a naive datetime
/// (`2016-01-01T00:00:00`, optional fractional seconds, read as UTC) and a
/// bare date (`2016-01-01`, midnight UTC).
#[must_use]
pub fn parse_datetime(s: &str) -> Option<bson::DateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(bson::DateTime::from_millis(dt.timestamp_millis()));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(bson::DateTime::from_millis(ndt.and_utc().timestamp_millis()));
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        && let Some(ndt) = nd.and_hms_opt(0, 0, 0)
    {
        return Some(bson::DateTime::from_millis(ndt.and_utc().timestamp_millis()));
    }
    None
}
