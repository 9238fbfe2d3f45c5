//! Daemon options, read from `config.json` in the config directory.
//!
//! A missing or unparsable file is never fatal: the daemon falls back to the
//! defaults and writes them out so the user has a file to edit.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, paths::APP_NAME, retention::Budget};

/// Minutes between ingest cycles.
pub const DEFAULT_REFRESH_INTERVAL: u64 = 120;
/// Gigabytes of media to retain.
pub const DEFAULT_STORAGE_SIZE: u64 = 5;

// ─── Video quality ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoQuality {
  #[serde(rename = "360")]
  P360,
  #[serde(rename = "480")]
  P480,
  /// Single-file mp4 with audio; plays everywhere.
  #[default]
  #[serde(rename = "720")]
  P720,
  #[serde(rename = "1080")]
  P1080,
}

impl VideoQuality {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim() {
      "360" => Some(Self::P360),
      "480" => Some(Self::P480),
      "720" => Some(Self::P720),
      "1080" => Some(Self::P1080),
      _ => None,
    }
  }

  /// The `yt-dlp` format code selecting this quality.
  pub fn format_code(self) -> &'static str {
    match self {
      Self::P360 => "18",
      Self::P480 => "135",
      Self::P720 => "22",
      Self::P1080 => "137",
    }
  }
}

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Options {
  pub download_path:    PathBuf,
  /// Minutes between ingest cycles.
  pub refresh_interval: u64,
  /// Retention budget in gigabytes.
  pub storage_size:     u64,
  pub video_quality:    VideoQuality,
}

/// The file as written by a user: every field optional and loosely typed.
#[derive(Debug, Default, Deserialize)]
struct RawOptions {
  #[serde(default)]
  download_path:    Option<PathBuf>,
  #[serde(default)]
  refresh_interval: Option<u64>,
  /// Accepts integers, floats and numeric strings; truncated to whole GB.
  #[serde(default)]
  storage_size:     Option<f64>,
  #[serde(default)]
  video_quality:    Option<String>,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      download_path:    default_download_path(),
      refresh_interval: DEFAULT_REFRESH_INTERVAL,
      storage_size:     DEFAULT_STORAGE_SIZE,
      video_quality:    VideoQuality::default(),
    }
  }
}

impl Options {
  /// Load `path`, or fall back to defaults and (re)write the file.
  pub fn load_or_create(path: &Path) -> Self {
    match Self::load(path) {
      Ok(options) => options,
      Err(e) => {
        tracing::warn!(
          path = %path.display(),
          error = %e,
          "using default configuration",
        );
        let defaults = Self::default();
        if let Err(e) = defaults.write(path) {
          tracing::error!(path = %path.display(), error = %e, "failed to write default configuration");
        }
        defaults
      }
    }
  }

  /// Load `path`, with `YTRACKER_*` environment variables taking precedence
  /// over the file.
  pub fn load(path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(File::from(path).format(FileFormat::Json).required(true))
      .add_source(Environment::with_prefix("YTRACKER"))
      .build()?;

    let raw: RawOptions = settings.try_deserialize()?;
    Ok(Self::from_raw(raw))
  }

  fn from_raw(raw: RawOptions) -> Self {
    let defaults = Self::default();

    let video_quality = match raw.video_quality.as_deref() {
      None => defaults.video_quality,
      Some(q) => VideoQuality::parse(q).unwrap_or_else(|| {
        tracing::warn!(video_quality = q, "unsupported video quality; using 720");
        defaults.video_quality
      }),
    };

    Self {
      download_path: raw
        .download_path
        .map(|p| resolve_download_path(&p))
        .unwrap_or(defaults.download_path),
      refresh_interval: raw.refresh_interval.unwrap_or(defaults.refresh_interval).max(1),
      storage_size: raw
        .storage_size
        .map(|gb| gb.max(0.0).trunc() as u64)
        .unwrap_or(defaults.storage_size),
      video_quality,
    }
  }

  /// Write these options to `path` as pretty-printed JSON.
  pub fn write(&self, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(Error::io(parent))?;
    }
    let json = serde_json::to_string_pretty(self)?;
    std::fs::write(path, json).map_err(Error::io(path))
  }

  /// Time to wait between cycles.
  pub fn refresh_period(&self) -> Duration {
    Duration::from_secs(self.refresh_interval.saturating_mul(60))
  }

  pub fn budget(&self) -> Budget { Budget::from_gigabytes(self.storage_size) }
}

fn default_download_path() -> PathBuf {
  dirs::home_dir()
    .unwrap_or_default()
    .join("Videos")
    .join(APP_NAME)
}

/// Anchor a configured download path: `~` and relative paths resolve under
/// the home directory, since the detached daemon runs from `/`.
fn resolve_download_path(path: &Path) -> PathBuf {
  let path = expand_tilde(path);
  if path.is_relative()
    && let Some(home) = dirs::home_dir()
  {
    return home.join(path);
  }
  path
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  if let Ok(rest) = path.strip_prefix("~")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config_file(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.json");
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn missing_file_yields_defaults_and_writes_them() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ytracker").join("config.json");

    let options = Options::load_or_create(&path);
    assert_eq!(options, Options::default());
    assert!(path.is_file());

    let written: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["refresh_interval"], 120);
    assert_eq!(written["storage_size"], 5);
    assert_eq!(written["video_quality"], "720");

    // The written file loads back to the same options.
    assert_eq!(Options::load(&path).unwrap(), options);
  }

  #[test]
  fn malformed_file_is_replaced_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = config_file(&dir, "{ this is not json");

    let options = Options::load_or_create(&path);
    assert_eq!(options, Options::default());
    assert!(Options::load(&path).is_ok());
  }

  #[test]
  fn values_from_file_are_used() {
    let dir = tempfile::tempdir().unwrap();
    let path = config_file(
      &dir,
      r#"{
        "download_path": "/media/yt",
        "refresh_interval": 30,
        "storage_size": 12,
        "video_quality": "1080"
      }"#,
    );

    let options = Options::load(&path).unwrap();
    assert_eq!(options.download_path, PathBuf::from("/media/yt"));
    assert_eq!(options.refresh_interval, 30);
    assert_eq!(options.refresh_period(), Duration::from_secs(30 * 60));
    assert_eq!(options.storage_size, 12);
    assert_eq!(options.budget().bytes(), 12 * 1_073_741_824);
    assert_eq!(options.video_quality, VideoQuality::P1080);
  }

  #[test]
  fn partial_file_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = config_file(&dir, r#"{ "storage_size": 2 }"#);

    let options = Options::load(&path).unwrap();
    assert_eq!(options.storage_size, 2);
    assert_eq!(options.refresh_interval, DEFAULT_REFRESH_INTERVAL);
    assert_eq!(options.video_quality, VideoQuality::P720);
    assert_eq!(options.download_path, default_download_path());
  }

  #[test]
  fn storage_size_accepts_floats_and_strings() {
    let dir = tempfile::tempdir().unwrap();

    let path = config_file(&dir, r#"{ "storage_size": 2.9 }"#);
    assert_eq!(Options::load(&path).unwrap().storage_size, 2);

    let path = config_file(&dir, r#"{ "storage_size": "7.5" }"#);
    assert_eq!(Options::load(&path).unwrap().storage_size, 7);
  }

  #[test]
  fn unknown_quality_falls_back_to_720() {
    let dir = tempfile::tempdir().unwrap();
    let path = config_file(&dir, r#"{ "video_quality": "4k" }"#);
    assert_eq!(Options::load(&path).unwrap().video_quality, VideoQuality::P720);
  }

  #[test]
  fn zero_interval_is_raised_to_one_minute() {
    let dir = tempfile::tempdir().unwrap();
    let path = config_file(&dir, r#"{ "refresh_interval": 0 }"#);
    assert_eq!(Options::load(&path).unwrap().refresh_interval, 1);
  }

  #[test]
  fn quality_maps_to_format_codes() {
    assert_eq!(VideoQuality::P1080.format_code(), "137");
    assert_eq!(VideoQuality::P720.format_code(), "22");
    assert_eq!(VideoQuality::P480.format_code(), "135");
    assert_eq!(VideoQuality::P360.format_code(), "18");
    assert_eq!(VideoQuality::parse(" 480 "), Some(VideoQuality::P480));
    assert_eq!(VideoQuality::parse("144"), None);
  }

  #[test]
  fn tilde_expands_to_home() {
    if let Some(home) = dirs::home_dir() {
      assert_eq!(expand_tilde(Path::new("~/Videos")), home.join("Videos"));
    }
    assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
  }

  #[test]
  fn relative_download_path_resolves_under_home() {
    let dir = tempfile::tempdir().unwrap();
    let path = config_file(&dir, r#"{ "download_path": "media/yt" }"#);
    let options = Options::load(&path).unwrap();

    assert!(options.download_path.is_absolute() || dirs::home_dir().is_none());
    if let Some(home) = dirs::home_dir() {
      assert_eq!(options.download_path, home.join("media/yt"));
    }
  }
}
