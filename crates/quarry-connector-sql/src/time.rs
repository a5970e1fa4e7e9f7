//! Time-string parsing for database values.
//!
//! Databases hand back timestamps in many shapes. The parser scans a list
//! of known formats, trying dialect-typical ones first when the dialect is
//! known, and finally falls back to epoch seconds or milliseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use crate::database::Dialect;

/// A time string that matched no known format.
#[derive(Debug, Error)]
#[error("unable to parse time string {value:?} with any known format")]
pub struct TimeParseError {
    pub value: String,
}

/// Formats carrying both date and time, in fallback order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",    // MySQL, PostgreSQL, SQL Server
    "%Y-%m-%dT%H:%M:%S%.f",    // ISO8601 without zone
    "%m/%d/%Y %H:%M:%S",       // US format
    "%d/%m/%Y %H:%M:%S",       // European format
    "%b %d, %Y %H:%M:%S",      // Oracle month-name format
    "%d-%b-%Y %H:%M:%S",       // Oracle DD-MMM-YYYY (any month case)
    "%d-%b-%y %H:%M:%S",       // Oracle short year
    "%B %d, %Y %H:%M:%S",      // Long month name
    "%Y-%m-%d-%H.%M.%S%.f",    // DB2
    "%a %b %e %H:%M:%S %Y",    // ANSI C asctime
];

/// Date-only formats, in fallback order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", // ISO date
    "%m/%d/%Y", // US short date
    "%d/%m/%Y", // European short date
    "%d-%m-%Y", // day-month-year
    "%d-%m-%y", // day-month-short year
];

/// Epoch-second values are accepted up to 2100-01-01.
const MAX_EPOCH_SECONDS: i64 = 4_102_444_800;

/// Epoch-millisecond values are accepted from 2001-09-09 up to 2100-01-01.
const MIN_EPOCH_MILLIS: i64 = 1_000_000_000_000;
const MAX_EPOCH_MILLIS: i64 = 4_102_444_800_000;

fn parse_with_formats(value: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}

fn parse_date_only(value: &str) -> Option<DateTime<Utc>> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

fn parse_epoch(value: &str) -> Option<DateTime<Utc>> {
    let n: i64 = value.parse().ok()?;

    if n > 0 && n < MAX_EPOCH_SECONDS {
        return Utc.timestamp_opt(n, 0).single();
    }
    if n > MIN_EPOCH_MILLIS && n < MAX_EPOCH_MILLIS {
        return Utc.timestamp_millis_opt(n).single();
    }
    None
}

/// Parse a time string by scanning every known format.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError {
            value: value.to_string(),
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_with_formats(trimmed, DATETIME_FORMATS) {
        return Ok(dt);
    }
    if let Some(dt) = parse_date_only(trimmed) {
        return Ok(dt);
    }
    if let Some(dt) = parse_epoch(trimmed) {
        return Ok(dt);
    }

    Err(TimeParseError {
        value: value.to_string(),
    })
}

/// Parse a time string, trying the dialect's typical formats first.
pub fn parse_time_with_dialect(
    value: &str,
    dialect: Dialect,
) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError {
            value: value.to_string(),
        });
    }

    let prioritized: &[&str] = match dialect {
        Dialect::MySql => &["%Y-%m-%d %H:%M:%S%.f"],
        Dialect::Postgres => &["%Y-%m-%d %H:%M:%S%.f"],
        Dialect::Oracle => &[
            "%d-%b-%Y %H:%M:%S",
            "%b %d, %Y %H:%M:%S",
        ],
        Dialect::Sqlite | Dialect::SqlServer => &[],
    };

    if let Some(dt) = parse_with_formats(trimmed, prioritized) {
        return Ok(dt);
    }

    parse_time(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap(),
        )
    }

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(
            parse_time("2025-04-17T14:30:45Z").unwrap(),
            utc(2025, 4, 17, 14, 30, 45)
        );
    }

    #[test]
    fn test_parse_sql_timestamp() {
        assert_eq!(
            parse_time("2025-04-17 14:30:45").unwrap(),
            utc(2025, 4, 17, 14, 30, 45)
        );
        assert_eq!(
            parse_time("2025-04-17 14:30:45.123456").unwrap().timestamp(),
            utc(2025, 4, 17, 14, 30, 45).timestamp()
        );
    }

    #[test]
    fn test_parse_oracle_uppercase_month() {
        assert_eq!(
            parse_time_with_dialect("17-APR-2025 14:30:45", Dialect::Oracle).unwrap(),
            utc(2025, 4, 17, 14, 30, 45)
        );
    }

    #[test]
    fn test_parse_oracle_mixed_case_month() {
        assert_eq!(
            parse_time_with_dialect("17-Apr-2025 14:30:45", Dialect::Oracle).unwrap(),
            utc(2025, 4, 17, 14, 30, 45)
        );
    }

    #[test]
    fn test_parse_db2_format() {
        assert_eq!(
            parse_time("2025-04-17-14.30.45.000000").unwrap().timestamp(),
            utc(2025, 4, 17, 14, 30, 45).timestamp()
        );
    }

    #[test]
    fn test_parse_date_only() {
        assert_eq!(
            parse_time("2025-04-17").unwrap(),
            utc(2025, 4, 17, 0, 0, 0)
        );
    }

    #[test]
    fn test_parse_epoch_seconds() {
        assert_eq!(
            parse_time("1744900245").unwrap(),
            utc(2025, 4, 17, 14, 30, 45)
        );
    }

    #[test]
    fn test_parse_epoch_milliseconds() {
        assert_eq!(
            parse_time("1744900245000").unwrap(),
            utc(2025, 4, 17, 14, 30, 45)
        );
    }

    #[test]
    fn test_epoch_windows_are_bounded() {
        // Past 2100 in seconds and in milliseconds.
        assert!(parse_time("4102444801").is_err());
        assert!(parse_time("4102444800001").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(parse_time("").is_err());
        assert!(parse_time("   ").is_err());
        assert!(parse_time("not a time").is_err());
    }

    #[test]
    fn test_dialect_fallback_to_generic() {
        // An ISO timestamp still parses under the Oracle dialect.
        assert_eq!(
            parse_time_with_dialect("2025-04-17T14:30:45Z", Dialect::Oracle).unwrap(),
            utc(2025, 4, 17, 14, 30, 45)
        );
    }

    #[test]
    fn test_us_format() {
        assert_eq!(
            parse_time("04/17/2025 14:30:45").unwrap(),
            utc(2025, 4, 17, 14, 30, 45)
        );
    }
}
