//! Tracing setup.
//!
//! Once detached the daemon has no terminal, so every event goes to the log
//! file in the data directory. `RUST_LOG` overrides the default `info` level.

use std::{fs::OpenOptions, path::Path, sync::Mutex};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Install the global subscriber, appending to `log_file`.
pub fn init(log_file: &Path) -> Result<()> {
  if let Some(parent) = log_file.parent() {
    std::fs::create_dir_all(parent).map_err(Error::io(parent))?;
  }
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(log_file)
    .map_err(Error::io(log_file))?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_ansi(false)
    .with_target(false)
    .with_writer(Mutex::new(file))
    .try_init()
    .map_err(|e| Error::Logging(e.to_string()))
}
