//! Timestamp utilities
//!
//! Timestamps are persisted as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that SQLite can compare them lexically.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp for storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Corrupt(format!("Invalid timestamp {:?}: {}", value, e)))
}

/// Parse an optional stored timestamp
pub fn from_db_opt(value: Option<String>) -> crate::Result<Option<DateTime<Utc>>> {
    value.as_deref().map(from_db).transpose()
}

/// Calendar date used in report file names (`YYYY-MM-DD`)
pub fn date_stamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Human-readable date used in report subjects and documents
pub fn long_date(ts: &DateTime<Utc>) -> String {
    ts.format("%B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_db_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::microseconds(1);
        assert_eq!(to_db(&whole), "2025-03-01T12:00:00.000000Z");
        assert_eq!(to_db(&whole).len(), to_db(&fractional).len());
        assert!(to_db(&whole) < to_db(&fractional));
    }

    #[test]
    fn test_db_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(from_db(&to_db(&ts)).unwrap(), ts);
        assert!(from_db("yesterday").is_err());
        assert_eq!(from_db_opt(None).unwrap(), None);
    }

    #[test]
    fn test_date_formats() {
        let ts = Utc.with_ymd_and_hms(2025, 7, 4, 9, 30, 0).unwrap();
        assert_eq!(date_stamp(&ts), "2025-07-04");
        assert_eq!(long_date(&ts), "July 4, 2025");
    }
}
