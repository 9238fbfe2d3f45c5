//! The poll/ingest pass: list each feed, download what the catalog has not
//! seen, record each download.

use std::path::Path;

use ytracker_core::{
  media::{MediaItem, NewMediaItem},
  store::CatalogStore,
};

use crate::{
  extract::{Candidate, Download, Extractor},
  feeds::FeedList,
  shutdown::Shutdown,
};

/// Items listed per feed per cycle.
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
  /// Newly catalogued items, in download order.
  pub downloaded: Vec<MediaItem>,
  /// Candidates already in the catalog.
  pub skipped:    usize,
  /// Candidates or feeds that failed and were passed over.
  pub failed:     usize,
}

/// What happened to one candidate.
enum Step {
  Known,
  Downloaded(MediaItem),
  Failed,
}

pub struct Ingestor<'a, S, E> {
  store:     &'a S,
  extractor: &'a E,
  limit:     usize,
}

impl<'a, S: CatalogStore, E: Extractor> Ingestor<'a, S, E> {
  pub fn new(store: &'a S, extractor: &'a E) -> Self {
    Self { store, extractor, limit: DEFAULT_LIMIT }
  }

  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }

  /// Poll every feed in order. Failures are logged and skipped; shutdown is
  /// checked between candidates.
  pub async fn run(&self, feeds: &FeedList, shutdown: &Shutdown) -> IngestReport {
    let mut report = IngestReport::default();

    'feeds: for feed in feeds.iter() {
      if shutdown.is_triggered() {
        break;
      }

      let candidates = match self.extractor.list_recent_items(feed, self.limit).await {
        Ok(candidates) => candidates,
        Err(e) => {
          tracing::error!(feed, error = %e, "failed to list feed");
          report.failed += 1;
          continue;
        }
      };
      tracing::debug!(feed, candidates = candidates.len(), "listed feed");

      for candidate in candidates.iter().take(self.limit) {
        if shutdown.is_triggered() {
          break 'feeds;
        }
        match self.ingest(candidate).await {
          Step::Known => report.skipped += 1,
          Step::Downloaded(item) => report.downloaded.push(item),
          Step::Failed => report.failed += 1,
        }
      }
    }

    tracing::info!(
      downloaded = report.downloaded.len(),
      skipped = report.skipped,
      failed = report.failed,
      "ingest pass finished",
    );
    report
  }

  async fn ingest(&self, candidate: &Candidate) -> Step {
    if let Some(source_id) = &candidate.source_id {
      match self.store.exists(source_id).await {
        Ok(true) => return Step::Known,
        Ok(false) => {}
        Err(e) => {
          tracing::error!(source_id = %source_id, error = %e, "catalog lookup failed");
          return Step::Failed;
        }
      }
    }

    let download = match self.extractor.fetch_item(&candidate.url).await {
      Ok(download) => download,
      Err(e) => {
        tracing::error!(url = %candidate.url, error = %e, "download failed");
        return Step::Failed;
      }
    };

    // The listing did not carry an id, so the catalog could not be consulted
    // before the fetch.
    if candidate.source_id.is_none() {
      match self.store.exists(&download.source_id).await {
        Ok(true) => {
          self.discard_unless_catalogued(&download).await;
          return Step::Known;
        }
        Ok(false) => {}
        Err(e) => {
          tracing::error!(source_id = %download.source_id, error = %e, "catalog lookup failed");
          self.discard_unless_catalogued(&download).await;
          return Step::Failed;
        }
      }
    }

    let size = match tokio::fs::metadata(&download.path).await {
      Ok(meta) => meta.len(),
      Err(e) => {
        tracing::error!(path = %download.path.display(), error = %e, "cannot stat downloaded file");
        return Step::Failed;
      }
    };

    let new_item = NewMediaItem::new()
      .source_id(download.source_id.clone())
      .location(download.path.clone())
      .size_bytes(size);
    match self.store.insert(new_item).await {
      Ok(item) => {
        tracing::info!(id = item.id, source_id = %item.source_id, size, "catalogued download");
        Step::Downloaded(item)
      }
      Err(e) => {
        tracing::error!(url = %candidate.url, error = %e, "failed to catalogue download");
        self.discard_unless_catalogued(&download).await;
        Step::Failed
      }
    }
  }

  /// Remove a fetched file that no active catalog row accounts for, so it
  /// cannot sit outside the storage budget.
  async fn discard_unless_catalogued(&self, download: &Download) {
    let owned = match self.store.find_by_source_id(&download.source_id).await {
      Ok(Some(item)) => !item.is_deleted() && item.location == download.path,
      Ok(None) => false,
      // Unknown ownership: keep the file rather than risk a catalogued one.
      Err(e) => {
        tracing::warn!(source_id = %download.source_id, error = %e, "cannot check download ownership");
        true
      }
    };
    if !owned {
      discard_file(&download.path).await;
    }
  }
}

async fn discard_file(path: &Path) {
  match tokio::fs::remove_file(path).await {
    Ok(()) => tracing::info!(path = %path.display(), "removed uncatalogued download"),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => {
      tracing::error!(path = %path.display(), error = %e, "failed to remove uncatalogued download");
    }
  }
}
