//! The feed list: channel URLs to poll, one per line.

use std::{
  path::{Path, PathBuf},
  sync::LazyLock,
};

use regex::Regex;

use crate::{Error, Result};

static CHANNEL_URL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^https://www\.youtube\.com/@[^/]+").expect("channel url pattern is valid")
});

/// Whether `url` has the shape of a channel page.
pub fn is_channel_url(url: &str) -> bool { CHANNEL_URL.is_match(url) }

/// Validated channel URLs, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedList {
  urls: Vec<String>,
}

impl FeedList {
  /// Read and validate the feed file at `path`.
  ///
  /// An unreadable file or one without a single valid URL is an error; the
  /// caller skips ingest for the cycle.
  pub fn load(path: &Path) -> Result<Self> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::FeedFile {
      path: path.to_path_buf(),
      source,
    })?;

    let feeds = Self::from_text(&text);
    if feeds.is_empty() {
      return Err(Error::NoValidFeeds(PathBuf::from(path)));
    }
    tracing::debug!(path = %path.display(), count = feeds.len(), "loaded feed list");
    Ok(feeds)
  }

  /// Parse feed lines, dropping blanks and anything that is not a channel
  /// URL.
  pub fn from_text(text: &str) -> Self {
    let urls = text
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .filter(|line| {
        let valid = is_channel_url(line);
        if !valid {
          tracing::warn!(url = line, "ignoring invalid channel url");
        }
        valid
      })
      .map(str::to_owned)
      .collect();
    Self { urls }
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> { self.urls.iter().map(String::as_str) }

  pub fn len(&self) -> usize { self.urls.len() }

  pub fn is_empty(&self) -> bool { self.urls.is_empty() }
}

impl FromIterator<String> for FeedList {
  fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
    Self { urls: iter.into_iter().filter(|url| is_channel_url(url)).collect() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channel_shape() {
    assert!(is_channel_url("https://www.youtube.com/@somechannel"));
    assert!(is_channel_url("https://www.youtube.com/@somechannel/videos"));
    assert!(!is_channel_url("https://youtube.com/@somechannel"));
    assert!(!is_channel_url("http://www.youtube.com/@somechannel"));
    assert!(!is_channel_url("https://www.youtube.com/@"));
    assert!(!is_channel_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
  }

  #[test]
  fn invalid_and_blank_lines_are_dropped() {
    let feeds = FeedList::from_text(
      "https://www.youtube.com/@first\n\
       \n\
       not a url\n\
       \t https://www.youtube.com/@second  \n\
       https://vimeo.com/@third\n",
    );
    let urls: Vec<_> = feeds.iter().collect();
    assert_eq!(urls, ["https://www.youtube.com/@first", "https://www.youtube.com/@second"]);
  }

  #[test]
  fn file_without_valid_urls_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ytracker_urls.txt");
    std::fs::write(&path, "garbage\n\n").unwrap();

    assert!(matches!(FeedList::load(&path), Err(Error::NoValidFeeds(p)) if p == path));
  }

  #[test]
  fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");
    assert!(matches!(FeedList::load(&path), Err(Error::FeedFile { .. })));
  }

  #[test]
  fn load_keeps_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ytracker_urls.txt");
    std::fs::write(&path, "https://www.youtube.com/@b\nhttps://www.youtube.com/@a\n").unwrap();

    let feeds = FeedList::load(&path).unwrap();
    assert_eq!(feeds.len(), 2);
    assert_eq!(feeds.iter().next(), Some("https://www.youtube.com/@b"));
  }
}
