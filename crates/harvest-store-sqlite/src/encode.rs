//! Encoding helpers between domain types and SQLite column values.
//!
//! Calendar dates are stored as ISO 8601 `YYYY-MM-DD` text, which sorts and
//! compares correctly as a string.

use chrono::NaiveDate;

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(date: NaiveDate) -> String { date.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}
