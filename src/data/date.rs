//! `YYYYMMDD` date handling for the date column.

use chrono::NaiveDate;

use super::error::{FrameError, Result};
use super::model::Value;

const COMPACT_FORMAT: &str = "%Y%m%d";

/// Parse an 8-digit `YYYYMMDD` string into a calendar date.
pub fn parse_compact(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, COMPACT_FORMAT).ok()
}

/// Render a date back into its 8-digit form.
pub fn format_compact(date: NaiveDate) -> String {
    date.format(COMPACT_FORMAT).to_string()
}

/// Normalize one date-column cell.
///
/// Integers and strings must spell an 8-digit calendar date; cells that
/// already hold a `Date` pass through. Everything else, `Null` included,
/// is a format error.
pub fn normalize(column: &str, value: &Value) -> Result<NaiveDate> {
    let parsed = match value {
        Value::Date(d) => Some(*d),
        Value::Integer(i) => parse_compact(&i.to_string()),
        Value::String(s) => parse_compact(s),
        _ => None,
    };
    parsed.ok_or_else(|| FrameError::Format {
        column: column.to_string(),
        value: match value {
            Value::Null => "<null>".to_string(),
            other => other.to_string(),
        },
    })
}

/// Parse a user-supplied date: `YYYYMMDD` or ISO `YYYY-MM-DD`.
pub fn parse_flexible(raw: &str) -> Option<NaiveDate> {
    parse_compact(raw).or_else(|| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
}
