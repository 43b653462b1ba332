//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed nanosecond
//! precision, so lexical order in SQL matches chronological order. Enums are
//! stored by their SCREAMING_SNAKE_CASE name. Lists are compact JSON.
//!
//! Decoders run inside row-mapping closures and so report failures as
//! [`rusqlite::Error::FromSqlConversionFailure`].

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Row, types::Type};
use serde::de::DeserializeOwned;

fn conversion_failure(
  idx: usize,
  e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

fn parse_dt(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| conversion_failure(idx, e))
}

pub fn dt(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  parse_dt(idx, &row.get::<_, String>(idx)?)
}

pub fn opt_dt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
  row
    .get::<_, Option<String>>(idx)?
    .map(|s| parse_dt(idx, &s))
    .transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: Option<NaiveDate>) -> Option<String> {
  d.map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
  row
    .get::<_, Option<String>>(idx)?
    .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_failure(idx, e)))
    .transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Decode a column through the type's `FromStr` (strum `EnumString`).
pub fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  row.get::<_, String>(idx)?.parse().map_err(|e| conversion_failure(idx, e))
}

// ─── JSON ────────────────────────────────────────────────────────────────────

pub fn json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
  serde_json::from_str(&row.get::<_, String>(idx)?).map_err(|e| conversion_failure(idx, e))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let whole = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let later = whole + chrono::Duration::milliseconds(5);
    assert_eq!(encode_dt(whole), "2025-01-01T12:00:00.000000000Z");
    assert!(encode_dt(whole) < encode_dt(later));
  }
}
