//! Conditional GET support.
//!
//! The storage emulator writes `Last-Modified` as `ddd, dd MM yyyy HH:mm:ss GMT`
//! (note the numeric month) and browsers echo that value back verbatim in
//! `If-Modified-Since`, so both directions use the same format.

use chrono::{DateTime, NaiveDateTime, Utc};

/// chrono pattern of the `Last-Modified` / `If-Modified-Since` wire format.
pub const WIRE_DATE_FORMAT: &str = "%a, %d %m %Y %H:%M:%S GMT";

/// Timestamps within this distance count as unchanged, which absorbs the
/// sub-second precision lost when the wire format truncates to whole seconds.
const FRESHNESS_TOLERANCE_MS: i64 = 1000;

/// Result of evaluating a conditional request against an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Client copy is current; answer 304 without a body.
    NotModified,
    /// Serve the object.
    Modified,
}

/// Format a timestamp in the wire format.
pub fn format_wire_date(ts: DateTime<Utc>) -> String {
    ts.format(WIRE_DATE_FORMAT).to_string()
}

/// Parse a wire-format timestamp; any mismatch (including a weekday that does
/// not agree with the date) yields `None`.
pub fn parse_wire_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), WIRE_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decide whether a request carrying `if_modified_since` may be short-circuited.
///
/// A missing or unparseable header means no condition was supplied.
pub fn evaluate(if_modified_since: Option<&str>, last_modified: DateTime<Utc>) -> Freshness {
    let Some(since) = if_modified_since.and_then(parse_wire_date) else {
        return Freshness::Modified;
    };

    let delta = (last_modified - since).num_milliseconds().abs();
    if delta <= FRESHNESS_TOLERANCE_MS {
        Freshness::NotModified
    } else {
        Freshness::Modified
    }
}
