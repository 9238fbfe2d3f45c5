//! Media items — one catalog row per downloaded unit.
//!
//! Rows are never physically removed during normal operation. Reclaiming
//! space flips an item's status to [`ItemStatus::Evicted`]; the row stays as
//! an audit trail and keeps its `source_id` reserved so the same media is
//! never downloaded twice.

use std::{path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Retention state of a catalogued item.
///
/// The only legal transition is `Active → Evicted`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemStatus {
  /// The file is on disk and counts toward the storage budget.
  #[default]
  Active,
  /// The file was removed to reclaim space.
  Evicted,
}

impl ItemStatus {
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownStatus(s.to_owned()))
  }

  /// Whether a row in this status may be rewritten with `next`.
  pub fn can_become(self, next: ItemStatus) -> bool {
    !(self == ItemStatus::Evicted && next == ItemStatus::Active)
  }
}

// ─── Stored item ─────────────────────────────────────────────────────────────

/// A catalogued download, as persisted by a [`CatalogStore`](crate::CatalogStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
  /// Store-assigned surrogate key.
  pub id:         i64,
  /// The platform's stable identifier for this media.
  pub source_id:  String,
  pub location:   PathBuf,
  pub size_bytes: u64,
  pub status:     ItemStatus,
  /// Set once at insert; the retention ordering key.
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl MediaItem {
  pub fn is_deleted(&self) -> bool { self.status == ItemStatus::Evicted }

  /// The same row with its status flipped to [`ItemStatus::Evicted`].
  pub fn evicted(mut self) -> Self {
    self.status = ItemStatus::Evicted;
    self
  }
}

// ─── Insert payload ──────────────────────────────────────────────────────────

/// Input to [`CatalogStore::insert`](crate::CatalogStore::insert).
///
/// Fields are optional until [`into_validated`](Self::into_validated) checks
/// them, so a partially filled payload is reported as an error instead of
/// reaching the database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMediaItem {
  pub source_id:  Option<String>,
  pub location:   Option<PathBuf>,
  pub size_bytes: Option<u64>,
  pub status:     ItemStatus,
}

/// A [`NewMediaItem`] with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedItem {
  pub source_id:  String,
  pub location:   PathBuf,
  pub size_bytes: u64,
  pub status:     ItemStatus,
}

impl NewMediaItem {
  pub fn new() -> Self { Self::default() }

  pub fn source_id(mut self, source_id: impl Into<String>) -> Self {
    self.source_id = Some(source_id.into());
    self
  }

  pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
    self.location = Some(location.into());
    self
  }

  pub fn size_bytes(mut self, size_bytes: u64) -> Self {
    self.size_bytes = Some(size_bytes);
    self
  }

  pub fn status(mut self, status: ItemStatus) -> Self {
    self.status = status;
    self
  }

  pub fn into_validated(self) -> Result<ValidatedItem> {
    Ok(ValidatedItem {
      source_id:  self.source_id.ok_or(Error::MissingField("source_id"))?,
      location:   self.location.ok_or(Error::MissingField("location"))?,
      size_bytes: self.size_bytes.ok_or(Error::MissingField("size_bytes"))?,
      status:     self.status,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips_through_text() {
    assert_eq!(ItemStatus::Active.as_ref(), "active");
    assert_eq!(ItemStatus::Evicted.to_string(), "evicted");
    assert_eq!(ItemStatus::parse("evicted").unwrap(), ItemStatus::Evicted);
    assert!(matches!(
      ItemStatus::parse("pending"),
      Err(Error::UnknownStatus(s)) if s == "pending"
    ));
  }

  #[test]
  fn eviction_never_reverts() {
    assert!(ItemStatus::Active.can_become(ItemStatus::Evicted));
    assert!(ItemStatus::Active.can_become(ItemStatus::Active));
    assert!(ItemStatus::Evicted.can_become(ItemStatus::Evicted));
    assert!(!ItemStatus::Evicted.can_become(ItemStatus::Active));
  }

  #[test]
  fn validation_reports_first_missing_field() {
    let err = NewMediaItem::new()
      .location("/tmp/a.mp4")
      .size_bytes(1)
      .into_validated()
      .unwrap_err();
    assert!(matches!(err, Error::MissingField("source_id")));

    let err = NewMediaItem::new()
      .source_id("abc")
      .location("/tmp/a.mp4")
      .into_validated()
      .unwrap_err();
    assert!(matches!(err, Error::MissingField("size_bytes")));
  }

  #[test]
  fn validated_item_keeps_status() {
    let item = NewMediaItem::new()
      .source_id("abc")
      .location("/tmp/a.mp4")
      .size_bytes(42)
      .status(ItemStatus::Evicted)
      .into_validated()
      .unwrap();
    assert_eq!(item.status, ItemStatus::Evicted);
    assert_eq!(item.size_bytes, 42);
  }
}
