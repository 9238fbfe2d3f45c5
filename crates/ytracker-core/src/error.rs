//! Error types for `ytracker-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// An insert payload is missing one of its required fields.
  #[error("cannot save media item: `{0}` is not set")]
  MissingField(&'static str),

  #[error("unknown item status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
