//! Storage budget enforcement.
//!
//! Once per cycle the [`RetentionController`] compares the catalog's retained
//! size with the [`Budget`] and evicts the oldest active items until the
//! catalog fits again. An item is marked evicted in the catalog *before* its
//! file is removed, so a failed status write never leaves a catalogued item
//! without its file.

use std::path::Path;

use ytracker_core::{media::MediaItem, store::CatalogStore};

use crate::shutdown::Shutdown;

/// Consecutive catalog failures tolerated before a cycle gives up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

const GIB: u64 = 1 << 30;

// ─── Budget ──────────────────────────────────────────────────────────────────

/// Maximum number of bytes the active catalog may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Budget(u64);

impl Budget {
  pub fn from_gigabytes(gb: u64) -> Self { Self(gb.saturating_mul(GIB)) }

  pub fn from_bytes(bytes: u64) -> Self { Self(bytes) }

  pub fn bytes(self) -> u64 { self.0 }

  pub fn is_exceeded_by(self, retained: u64) -> bool { retained > self.0 }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Why an eviction pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionOutcome {
  /// Retained size is at or below the budget.
  #[default]
  WithinBudget,
  /// The retained size could not be read; nothing was evicted.
  SizeUnknown,
  /// Over budget with no active items left.
  NothingToEvict,
  /// Gave up after [`MAX_CONSECUTIVE_FAILURES`] catalog errors in a row.
  TooManyFailures,
  /// Shutdown was requested between evictions.
  Interrupted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
  /// Items marked evicted this pass, oldest first.
  pub evicted:         Vec<MediaItem>,
  pub reclaimed_bytes: u64,
  pub outcome:         EvictionOutcome,
}

// ─── Controller ──────────────────────────────────────────────────────────────

pub struct RetentionController<'a, S> {
  store:  &'a S,
  budget: Budget,
}

impl<'a, S: CatalogStore> RetentionController<'a, S> {
  pub fn new(store: &'a S, budget: Budget) -> Self { Self { store, budget } }

  /// Evict oldest-first until the catalog fits the budget.
  pub async fn run(&self, shutdown: &Shutdown) -> EvictionReport {
    let mut report = EvictionReport::default();

    let mut retained = match self.store.sum_retained_size().await {
      Ok(size) => size,
      Err(e) => {
        tracing::error!(error = %e, "retained size unknown, skipping eviction this cycle");
        report.outcome = EvictionOutcome::SizeUnknown;
        return report;
      }
    };

    if !self.budget.is_exceeded_by(retained) {
      tracing::debug!(retained, budget = self.budget.bytes(), "within storage budget");
      return report;
    }
    tracing::info!(retained, budget = self.budget.bytes(), "storage budget exceeded, evicting");

    let mut failures = 0;
    while self.budget.is_exceeded_by(retained) {
      if shutdown.is_triggered() {
        report.outcome = EvictionOutcome::Interrupted;
        break;
      }
      if failures >= MAX_CONSECUTIVE_FAILURES {
        tracing::error!(failures, retained, "critical: eviction aborted after repeated catalog failures");
        report.outcome = EvictionOutcome::TooManyFailures;
        break;
      }

      let oldest = match self.store.oldest_not_deleted().await {
        Ok(Some(item)) => item,
        Ok(None) => {
          tracing::warn!(retained, "budget exceeded but nothing left to evict");
          report.outcome = EvictionOutcome::NothingToEvict;
          break;
        }
        Err(e) => {
          failures += 1;
          tracing::error!(error = %e, failures, "failed to look up oldest item");
          continue;
        }
      };

      // The status flip is persisted first; if it fails the file stays.
      let evicted = match self.store.update(&oldest.evicted()).await {
        Ok(item) => item,
        Err(e) => {
          failures += 1;
          tracing::error!(error = %e, failures, "failed to mark item evicted");
          continue;
        }
      };
      failures = 0;

      remove_media_file(&evicted.location).await;
      tracing::info!(
        id = evicted.id,
        source_id = %evicted.source_id,
        size = evicted.size_bytes,
        "evicted media item",
      );

      retained = retained.saturating_sub(evicted.size_bytes);
      report.reclaimed_bytes += evicted.size_bytes;
      report.evicted.push(evicted);
    }

    if report.outcome == EvictionOutcome::WithinBudget {
      tracing::info!(
        evicted = report.evicted.len(),
        reclaimed = report.reclaimed_bytes,
        "storage back within budget",
      );
    }
    report
  }
}

/// Remove an evicted item's file. Failures are logged, never retried.
async fn remove_media_file(path: &Path) {
  match tokio::fs::remove_file(path).await {
    Ok(()) => {}
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      tracing::warn!(path = %path.display(), "evicted file was already gone");
    }
    Err(e) => {
      tracing::error!(path = %path.display(), error = %e, "failed to delete evicted file");
    }
  }
}
