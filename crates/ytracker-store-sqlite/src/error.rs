//! Error type for `ytracker-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ytracker_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// Creating the schema failed; the catalog cannot be used at all.
  #[error("failed to initialise catalog schema: {0}")]
  Schema(#[source] tokio_rusqlite::Error),

  #[error("failed to create catalog directory {path}: {source}")]
  CreateDir {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("media path is not valid UTF-8: {0:?}")]
  NonUtf8Path(PathBuf),

  #[error("size {0} does not fit the catalog's integer column")]
  SizeOutOfRange(u64),

  #[error("negative size {0} stored in catalog")]
  NegativeSize(i64),

  #[error("row count {0} is out of range")]
  InvalidCount(i64),

  #[error("source id {0:?} is already catalogued")]
  Duplicate(String),

  #[error("media item not found: {0}")]
  NotFound(i64),

  #[error("media item {0} is evicted and cannot become active again")]
  StatusReverted(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
