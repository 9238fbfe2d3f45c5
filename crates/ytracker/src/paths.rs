//! Per-user locations of everything the daemon persists.
//!
//! ```text
//! <data_dir>/ytracker/ytracker.db         catalog
//! <data_dir>/ytracker/ytracker.pid        pid file
//! <data_dir>/ytracker/ytracker.log        log file
//! <data_dir>/ytracker/ytracker_urls.txt   feed list
//! <config_dir>/ytracker/config.json       options
//! ```

use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const APP_NAME: &str = "ytracker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
  data_dir:   PathBuf,
  config_dir: PathBuf,
}

impl AppPaths {
  /// Resolve the platform data and config directories for the current user,
  /// falling back to `~/.local/share` and `~/.config`.
  pub fn discover() -> Result<Self> {
    let home = dirs::home_dir();
    let data_root = dirs::data_dir()
      .or_else(|| home.as_ref().map(|h| h.join(".local").join("share")))
      .ok_or(Error::NoHomeDir)?;
    let config_root = dirs::config_dir()
      .or_else(|| home.as_ref().map(|h| h.join(".config")))
      .ok_or(Error::NoHomeDir)?;

    Ok(Self {
      data_dir:   data_root.join(APP_NAME),
      config_dir: config_root.join(APP_NAME),
    })
  }

  /// Keep everything under one root — used by tests.
  pub fn under(root: impl AsRef<Path>) -> Self {
    let root = root.as_ref();
    Self {
      data_dir:   root.join("data"),
      config_dir: root.join("config"),
    }
  }

  pub fn ensure_dirs(&self) -> Result<()> {
    for dir in [&self.data_dir, &self.config_dir] {
      std::fs::create_dir_all(dir).map_err(Error::io(dir))?;
    }
    Ok(())
  }

  pub fn data_dir(&self) -> &Path { &self.data_dir }

  pub fn config_dir(&self) -> &Path { &self.config_dir }

  pub fn db_file(&self) -> PathBuf { self.data_dir.join(format!("{APP_NAME}.db")) }

  pub fn pid_file(&self) -> PathBuf { self.data_dir.join(format!("{APP_NAME}.pid")) }

  pub fn log_file(&self) -> PathBuf { self.data_dir.join(format!("{APP_NAME}.log")) }

  pub fn feeds_file(&self) -> PathBuf {
    self.data_dir.join(format!("{APP_NAME}_urls.txt"))
  }

  pub fn config_file(&self) -> PathBuf { self.config_dir.join("config.json") }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn files_live_in_their_directories() {
    let paths = AppPaths::under("/srv/yt");
    assert_eq!(paths.db_file(), PathBuf::from("/srv/yt/data/ytracker.db"));
    assert_eq!(paths.pid_file(), PathBuf::from("/srv/yt/data/ytracker.pid"));
    assert_eq!(paths.log_file(), PathBuf::from("/srv/yt/data/ytracker.log"));
    assert_eq!(paths.feeds_file(), PathBuf::from("/srv/yt/data/ytracker_urls.txt"));
    assert_eq!(paths.config_file(), PathBuf::from("/srv/yt/config/config.json"));
  }

  #[test]
  fn ensure_dirs_creates_both_roots() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = AppPaths::under(tmp.path().join("nested"));
    paths.ensure_dirs().unwrap();
    assert!(paths.data_dir().is_dir());
    assert!(paths.config_dir().is_dir());
  }

  #[test]
  fn discovered_dirs_are_named_after_the_app() {
    if let Ok(paths) = AppPaths::discover() {
      assert!(paths.data_dir().ends_with(APP_NAME));
      assert!(paths.config_dir().ends_with(APP_NAME));
    }
  }
}
