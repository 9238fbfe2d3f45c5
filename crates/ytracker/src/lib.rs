//! The ytracker daemon.
//!
//! Polls channel feeds for new media, downloads it through an [`Extractor`],
//! records every download in the catalog, and evicts the oldest media once
//! the configured storage budget is exceeded. The binary in `main.rs` wires
//! these pieces to a [`Supervisor`] that keeps a single instance running.

pub mod config;
pub mod error;
pub mod extract;
pub mod feeds;
pub mod ingest;
pub mod logging;
pub mod paths;
pub mod retention;
pub mod scheduler;
pub mod shutdown;
pub mod supervisor;

pub use config::{Options, VideoQuality};
pub use error::{Error, Result};
pub use extract::{Extractor, YtDlp};
pub use feeds::FeedList;
pub use ingest::Ingestor;
pub use paths::AppPaths;
pub use retention::{Budget, RetentionController};
pub use scheduler::Scheduler;
pub use shutdown::Shutdown;
pub use supervisor::{Detach, PidFile, Supervisor};
