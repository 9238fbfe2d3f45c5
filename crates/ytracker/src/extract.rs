//! Media extraction: listing a channel's recent uploads and downloading one.
//!
//! The [`Extractor`] trait is the seam the ingest loop depends on; [`YtDlp`]
//! implements it by shelling out to the `yt-dlp` executable.

use std::{
  future::Future,
  path::{Path, PathBuf},
  process::Stdio,
};

use serde::{Deserialize, de::DeserializeOwned};
use tokio::process::Command;

use crate::{Error, Options, Result, VideoQuality};

// ─── Types ───────────────────────────────────────────────────────────────────

/// An item listed on a feed, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
  pub url:       String,
  /// Known when the listing carries it; lets the caller skip catalogued
  /// items without fetching them.
  pub source_id: Option<String>,
}

/// The pieces the on-disk file name is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameParts {
  /// `YYYYMMDD`.
  pub upload_date: String,
  pub uploader:    String,
  pub source_id:   String,
}

impl FilenameParts {
  pub fn new(
    upload_date: Option<String>,
    uploader: impl AsRef<str>,
    source_id: impl Into<String>,
  ) -> Self {
    Self {
      upload_date: upload_date
        .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d").to_string()),
      uploader:    uploader.as_ref().replace(['/', '\\'], "_"),
      source_id:   source_id.into(),
    }
  }

  /// `{upload_date}_{uploader}_{source_id}.mp4`
  pub fn file_name(&self) -> String {
    format!("{}_{}_{}.mp4", self.upload_date, self.uploader, self.source_id)
  }
}

/// A finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
  pub source_id: String,
  pub filename:  FilenameParts,
  pub path:      PathBuf,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

pub trait Extractor: Send + Sync {
  /// Up to `limit` items from `feed_url`, most recent first.
  fn list_recent_items<'a>(
    &'a self,
    feed_url: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Candidate>>> + Send + 'a;

  /// Download `item_url`. The returned path exists when this succeeds.
  fn fetch_item<'a>(
    &'a self,
    item_url: &'a str,
  ) -> impl Future<Output = Result<Download>> + Send + 'a;
}

// ─── yt-dlp ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Playlist {
  #[serde(default)]
  entries: Vec<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
  id:  Option<String>,
  url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemInfo {
  id:          Option<String>,
  uploader:    Option<String>,
  upload_date: Option<String>,
}

/// [`Extractor`] backed by the `yt-dlp` command line tool.
#[derive(Debug, Clone)]
pub struct YtDlp {
  program:      String,
  download_dir: PathBuf,
  quality:      VideoQuality,
}

impl YtDlp {
  pub fn new(options: &Options) -> Self {
    Self {
      program:      "yt-dlp".to_owned(),
      download_dir: options.download_path.clone(),
      quality:      options.video_quality,
    }
  }

  /// Use a different executable, e.g. an absolute path.
  pub fn with_program(mut self, program: impl Into<String>) -> Self {
    self.program = program.into();
    self
  }

  pub fn download_dir(&self) -> &Path { &self.download_dir }

  async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new(&self.program)
      .args(args)
      .stdin(Stdio::null())
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|source| Error::Spawn { program: self.program.clone(), source })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let reason = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
      return Err(Error::Extractor(format!(
        "{} exited with {}: {}",
        self.program,
        output.status,
        reason.trim(),
      )));
    }
    Ok(output.stdout)
  }

  async fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
    let stdout = self.run(args).await?;
    Ok(serde_json::from_slice(&stdout)?)
  }
}

impl Extractor for YtDlp {
  async fn list_recent_items(&self, feed_url: &str, limit: usize) -> Result<Vec<Candidate>> {
    tracing::info!(feed = feed_url, "listing recent items");
    let url = videos_tab(feed_url);
    let limit = limit.to_string();
    let playlist: Playlist = self
      .run_json(&["--flat-playlist", "--playlist-end", limit.as_str(), "-J", "--", url.as_str()])
      .await?;
    Ok(candidates(playlist))
  }

  async fn fetch_item(&self, item_url: &str) -> Result<Download> {
    tracing::info!(url = item_url, "fetching item info");
    let info: ItemInfo = self.run_json(&["-J", "--", item_url]).await?;
    let filename = filename_parts(info)?;
    let path = self.download_dir.join(filename.file_name());

    tokio::fs::create_dir_all(&self.download_dir)
      .await
      .map_err(Error::io(&self.download_dir))?;

    tracing::info!(url = item_url, path = %path.display(), "downloading");
    let template = output_template(&path);
    self
      .run(&[
        "-q",
        "--no-progress",
        "-f",
        self.quality.format_code(),
        "-o",
        template.as_str(),
        "--",
        item_url,
      ])
      .await?;

    let is_file = tokio::fs::metadata(&path)
      .await
      .map(|m| m.is_file())
      .unwrap_or(false);
    if !is_file {
      return Err(Error::Extractor(format!(
        "download finished but {} does not exist",
        path.display()
      )));
    }

    tracing::info!(url = item_url, "finished downloading");
    Ok(Download { source_id: filename.source_id.clone(), filename, path })
  }
}

/// A bare channel URL lists the channel's tabs; point it at the uploads.
fn videos_tab(feed_url: &str) -> String {
  let trimmed = feed_url.trim_end_matches('/');
  let has_tab = trimmed
    .split_once("/@")
    .is_some_and(|(_, handle)| handle.contains('/'));
  if has_tab { trimmed.to_owned() } else { format!("{trimmed}/videos") }
}

fn candidates(playlist: Playlist) -> Vec<Candidate> {
  playlist
    .entries
    .into_iter()
    .filter_map(|entry| {
      let url = entry.url.or_else(|| {
        entry
          .id
          .as_ref()
          .map(|id| format!("https://www.youtube.com/watch?v={id}"))
      })?;
      Some(Candidate { url, source_id: entry.id })
    })
    .collect()
}

fn filename_parts(info: ItemInfo) -> Result<FilenameParts> {
  let source_id = info
    .id
    .filter(|id| !id.is_empty())
    .ok_or_else(|| Error::Extractor("item info has no id".into()))?;
  let uploader = info
    .uploader
    .filter(|u| !u.is_empty())
    .ok_or_else(|| Error::Extractor(format!("item {source_id} has no uploader")))?;
  Ok(FilenameParts::new(info.upload_date, uploader, source_id))
}

/// yt-dlp treats `%` in `-o` as a template field.
fn output_template(path: &Path) -> String { path.to_string_lossy().replace('%', "%%") }
