//! The `CatalogStore` trait.
//!
//! Implemented by storage backends (e.g. `ytracker-store-sqlite`). The daemon's
//! ingest and retention loops depend on this abstraction, not on a concrete
//! backend.

use std::future::Future;

use crate::media::{ItemStatus, MediaItem, NewMediaItem};

/// Abstraction over the catalog of downloaded media.
///
/// Every method commits before its future resolves, so a crash between two
/// calls never leaves a half-applied write behind.
pub trait CatalogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new item. The store assigns `id`, `created_at` and
  /// `updated_at`.
  ///
  /// Fails if a required field is unset or if `source_id` is already
  /// catalogued (evicted rows included).
  fn insert(
    &self,
    item: NewMediaItem,
  ) -> impl Future<Output = Result<MediaItem, Self::Error>> + Send + '_;

  /// Rewrite the row keyed by `item.id` and refresh its `updated_at`.
  ///
  /// Fails if the row does not exist or if the update would move an evicted
  /// item back to active.
  fn update<'a>(
    &'a self,
    item: &'a MediaItem,
  ) -> impl Future<Output = Result<MediaItem, Self::Error>> + Send + 'a;

  /// Physically remove a row. Administrative use only; retention never calls
  /// this. Returns whether a row was removed.
  fn delete(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Whether any row, active or evicted, carries `source_id`.
  fn exists<'a>(
    &'a self,
    source_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn find_by_id(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<MediaItem>, Self::Error>> + Send + '_;

  fn find_by_source_id<'a>(
    &'a self,
    source_id: &'a str,
  ) -> impl Future<Output = Result<Option<MediaItem>, Self::Error>> + Send + 'a;

  /// The active item with the smallest `created_at`, ties broken by lowest
  /// `id`.
  fn oldest_not_deleted(
    &self,
  ) -> impl Future<Output = Result<Option<MediaItem>, Self::Error>> + Send + '_;

  /// Sum of `size_bytes` over active items; `0` when there are none.
  ///
  /// An error means the size is unknown. Callers must not read it as zero.
  fn sum_retained_size(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All items in `status`, oldest first.
  fn list(
    &self,
    status: ItemStatus,
  ) -> impl Future<Output = Result<Vec<MediaItem>, Self::Error>> + Send + '_;

  fn count(
    &self,
    status: ItemStatus,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
