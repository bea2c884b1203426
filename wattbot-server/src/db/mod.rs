//! Database access for wattbot-server
//!
//! Free functions over a `SqlitePool`, one module per table. Dates are
//! stored as `YYYY-MM-DD` text and timestamps as RFC 3339 text, so SQL
//! comparisons on either column order chronologically.

pub mod checkpoints;
pub mod prices;
pub mod readings;
pub mod settings;

use chrono::{DateTime, NaiveDate, Utc};
use wattbot_common::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(value: &str, column: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| Error::Serialization(format!("Failed to parse {} '{}': {}", column, value, e)))
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("Failed to parse {} '{}': {}", column, value, e)))
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
    column: &str,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_timestamp(&s, column)).transpose()
}
