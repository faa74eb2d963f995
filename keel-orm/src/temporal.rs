//! # Temporal Module
//!
//! Parsing and formatting of date/time values. The `Any` driver moves temporal
//! values as text, so these helpers define the wire format per dialect and
//! accept the shapes databases hand back (RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`
//! with or without an offset).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::{Error, Value};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

// ============================================================================
// Parsing
// ============================================================================

/// Parses a timestamp, assuming UTC when the text carries no offset.
pub fn parse_datetime_utc(value: &str) -> Result<DateTime<Utc>, Error> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    parse_naive_datetime(value)
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::Conversion(format!("Failed to parse DateTime<Utc> from `{value}`")))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime, Error> {
    let value = value.trim();
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_utc());
    }
    Err(Error::Conversion(format!("Failed to parse NaiveDateTime from `{value}`")))
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate, Error> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| parse_naive_datetime(value).map(|dt| dt.date()).map_err(|_| ()))
        .map_err(|_| Error::Conversion(format!("Failed to parse NaiveDate from `{value}`")))
}

pub fn parse_naive_time(value: &str) -> Result<NaiveTime, Error> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| Error::Conversion(format!("Failed to parse NaiveTime from `{value}`: {e}")))
}

// ============================================================================
// Formatting
// ============================================================================

/// ISO 8601 text used by PostgreSQL and SQLite.
pub fn iso_text(value: &Value) -> Option<String> {
    match value {
        Value::Date(v) => Some(v.format("%Y-%m-%d").to_string()),
        Value::Time(v) => Some(v.format("%H:%M:%S%.6f").to_string()),
        Value::DateTime(v) => Some(v.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        Value::Timestamp(v) => Some(v.to_rfc3339()),
        _ => None,
    }
}

/// MySQL `DATETIME` text: no `T` separator, no offset.
pub fn mysql_text(value: &Value) -> Option<String> {
    match value {
        Value::Timestamp(v) => Some(v.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        other => iso_text(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_datetime_utc("2024-01-02T03:04:05Z").unwrap(), expected);
        assert_eq!(parse_datetime_utc("2024-01-02 03:04:05").unwrap(), expected);
        assert_eq!(parse_datetime_utc("2024-01-02 05:04:05+02:00").unwrap(), expected);
        assert!(parse_datetime_utc("yesterday").is_err());
    }

    #[test]
    fn test_parse_dates_and_times() {
        assert_eq!(parse_naive_date("2024-02-29").unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(parse_naive_date("2024-02-29 10:00:00").unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(parse_naive_time("12:30").unwrap(), NaiveTime::from_hms_opt(12, 30, 0).unwrap());
    }

    #[test]
    fn test_formats() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(iso_text(&Value::Timestamp(ts)).unwrap(), "2024-01-02T03:04:05+00:00");
        assert_eq!(mysql_text(&Value::Timestamp(ts)).unwrap(), "2024-01-02 03:04:05.000000");
        assert_eq!(iso_text(&Value::Int(1)), None);
    }
}
