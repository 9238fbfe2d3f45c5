//! SQLite backend for the ytracker media catalog.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. File-backed catalogs open a fresh
//! connection per operation; nothing stays open across the daemon's sleep.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteCatalog;
