//! Core types and trait definitions for the ytracker media catalog.
//!
//! This crate is free of database and process-management dependencies. The
//! SQLite backend and the daemon both depend on it.

pub mod criteria;
pub mod error;
pub mod media;
pub mod store;

pub use criteria::{Connective, Criteria, Direction};
pub use error::{Error, Result};
pub use media::{ItemStatus, MediaItem, NewMediaItem, ValidatedItem};
pub use store::CatalogStore;
