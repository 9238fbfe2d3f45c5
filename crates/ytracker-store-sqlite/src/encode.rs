//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 UTC strings with a fixed microsecond fraction, so
//! comparing the text compares the instants. Paths are stored as UTF-8.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use ytracker_core::media::{ItemStatus, MediaItem};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Current time, truncated to the precision the catalog stores.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Path ────────────────────────────────────────────────────────────────────

pub fn encode_path(path: &Path) -> Result<String> {
  path
    .to_str()
    .map(str::to_owned)
    .ok_or_else(|| Error::NonUtf8Path(path.to_path_buf()))
}

// ─── Size ────────────────────────────────────────────────────────────────────

pub fn encode_size(size: u64) -> Result<i64> {
  i64::try_from(size).map_err(|_| Error::SizeOutOfRange(size))
}

pub fn decode_size(size: i64) -> Result<u64> {
  u64::try_from(size).map_err(|_| Error::NegativeSize(size))
}

pub fn decode_count(count: i64) -> Result<u64> {
  u64::try_from(count).map_err(|_| Error::InvalidCount(count))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `media_items` row.
pub struct RawMediaItem {
  pub id:         i64,
  pub source_id:  String,
  pub location:   String,
  pub size_bytes: i64,
  pub status:     String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawMediaItem {
  /// Row mapper for statements selecting [`COLUMNS`](crate::schema::COLUMNS).
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      source_id:  row.get(1)?,
      location:   row.get(2)?,
      size_bytes: row.get(3)?,
      status:     row.get(4)?,
      created_at: row.get(5)?,
      updated_at: row.get(6)?,
    })
  }

  pub fn into_item(self) -> Result<MediaItem> {
    Ok(MediaItem {
      id:         self.id,
      source_id:  self.source_id,
      location:   PathBuf::from(self.location),
      size_bytes: decode_size(self.size_bytes)?,
      status:     ItemStatus::parse(&self.status)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_have_fixed_width() {
    let whole = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let fractional = whole + chrono::Duration::microseconds(120);
    let a = encode_dt(whole);
    let b = encode_dt(fractional);
    assert_eq!(a, "2024-01-02T03:04:05.000000Z");
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap(), fractional);
  }

  #[test]
  fn sizes_outside_sqlite_range_are_rejected() {
    assert!(matches!(encode_size(u64::MAX), Err(Error::SizeOutOfRange(_))));
    assert!(matches!(decode_size(-1), Err(Error::NegativeSize(-1))));
    assert_eq!(decode_size(encode_size(4096).unwrap()).unwrap(), 4096);
  }

  #[test]
  fn negative_count_is_not_a_size_error() {
    assert!(matches!(decode_count(-3), Err(Error::InvalidCount(-3))));
    assert_eq!(decode_count(7).unwrap(), 7);
  }
}
