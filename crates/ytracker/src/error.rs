//! Error type for the ytracker daemon.

use std::path::PathBuf;

use nix::{errno::Errno, unistd::Pid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("i/o error at {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("could not determine the home directory")]
  NoHomeDir,

  #[error("cannot read feed list {path}: {source}")]
  FeedFile {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("no valid channel urls in {0}")]
  NoValidFeeds(PathBuf),

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source:  std::io::Error,
  },

  #[error("extractor error: {0}")]
  Extractor(String),

  #[error("failed to write pid file {path}: {source}")]
  PidFileWrite {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("another instance holds {0}")]
  AlreadyRunning(PathBuf),

  #[error("failed to lock pid file {path}: {source}")]
  PidFileLock {
    path:   PathBuf,
    #[source]
    source: Errno,
  },

  #[error("daemon {0} is still running after SIGTERM")]
  StillRunning(Pid),

  #[error("failed to signal process {pid}: {source}")]
  Signal {
    pid:    Pid,
    #[source]
    source: Errno,
  },

  #[error("failed to detach from the terminal: {0}")]
  Detach(#[source] Errno),

  #[error("failed to initialise logging: {0}")]
  Logging(String),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { path, source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
