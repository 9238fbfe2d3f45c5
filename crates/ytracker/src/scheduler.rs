//! The daemon's main loop: ingest, then retention, then a cancellable wait.

use ytracker_core::store::CatalogStore;

use crate::{
  config::Options,
  extract::Extractor,
  feeds::FeedList,
  ingest::{IngestReport, Ingestor},
  paths::AppPaths,
  retention::{EvictionReport, RetentionController},
  shutdown::Shutdown,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
  /// `None` when the feed list was missing or had no valid URLs.
  pub ingest:   Option<IngestReport>,
  pub eviction: EvictionReport,
}

pub struct Scheduler<S, E> {
  store:     S,
  extractor: E,
  paths:     AppPaths,
  options:   Options,
}

impl<S: CatalogStore, E: Extractor> Scheduler<S, E> {
  pub fn new(store: S, extractor: E, paths: AppPaths, options: Options) -> Self {
    Self { store, extractor, paths, options }
  }

  #[cfg(test)]
  fn store(&self) -> &S { &self.store }

  /// One cycle. The feed list is re-read every time so edits take effect
  /// without a restart; retention runs even when ingest is skipped.
  pub async fn tick(&self, shutdown: &Shutdown) -> CycleReport {
    let feeds_file = self.paths.feeds_file();
    let ingest = match FeedList::load(&feeds_file) {
      Ok(feeds) => Some(
        Ingestor::new(&self.store, &self.extractor)
          .run(&feeds, shutdown)
          .await,
      ),
      Err(e) => {
        tracing::error!(error = %e, "no usable feeds, skipping ingest this cycle");
        None
      }
    };

    let eviction = RetentionController::new(&self.store, self.options.budget())
      .run(shutdown)
      .await;

    CycleReport { ingest, eviction }
  }

  /// Run cycles until shutdown. Returns the number of cycles completed.
  pub async fn run(&self, shutdown: &Shutdown) -> u64 {
    let period = self.options.refresh_period();
    tracing::info!(
      refresh_minutes = self.options.refresh_interval,
      budget = self.options.budget().bytes(),
      "scheduler started",
    );

    let mut cycles = 0;
    while !shutdown.is_triggered() {
      cycles += 1;
      tracing::info!(cycle = cycles, "starting cycle");
      self.tick(shutdown).await;

      if !shutdown.sleep(period).await {
        break;
      }
    }

    tracing::info!(cycles, "scheduler stopped");
    cycles
  }
}
