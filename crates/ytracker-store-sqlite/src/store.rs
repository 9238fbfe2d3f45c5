//! [`SqliteCatalog`] — the SQLite implementation of [`CatalogStore`].

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use rusqlite::{OptionalExtension as _, types::Value};
use ytracker_core::{
  criteria::Criteria,
  media::{ItemStatus, MediaItem, NewMediaItem},
  store::CatalogStore,
};

use crate::{
  Error, Result,
  encode::{RawMediaItem, decode_count, decode_dt, decode_size, encode_dt, encode_path, encode_size, now},
  schema::{COLUMNS, SCHEMA},
};

/// How long a per-operation connection waits on a lock held by another
/// process before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Backing {
  /// Connect-per-operation against a database file.
  File(PathBuf),
  /// One shared in-memory connection; each new connection would otherwise
  /// see an empty database.
  Memory(tokio_rusqlite::Connection),
}

/// A media catalog backed by a single SQLite file.
///
/// Cloning is cheap: a file-backed catalog only holds its path.
#[derive(Clone)]
pub struct SqliteCatalog {
  backing: Backing,
}

impl SqliteCatalog {
  /// Open (or create) a catalog at `path`, creating parent directories and
  /// the schema as needed.
  ///
  /// A schema failure is reported as [`Error::Schema`]; the daemon treats it
  /// as fatal.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| Error::CreateDir { path: parent.to_path_buf(), source })?;
    }

    let store = Self { backing: Backing::File(path) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory catalog — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { backing: Backing::Memory(conn) };
    store.init_schema().await?;
    Ok(store)
  }

  /// The database file, or `None` for an in-memory catalog.
  pub fn path(&self) -> Option<&Path> {
    match &self.backing {
      Backing::File(path) => Some(path),
      Backing::Memory(_) => None,
    }
  }

  async fn init_schema(&self) -> Result<()> {
    let result = self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await;

    match result {
      Err(Error::Database(e)) => Err(Error::Schema(e)),
      other => other,
    }
  }

  async fn connect(&self) -> Result<tokio_rusqlite::Connection> {
    match &self.backing {
      Backing::File(path) => {
        let conn = tokio_rusqlite::Connection::open(path.clone()).await?;
        conn
          .call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
          })
          .await?;
        Ok(conn)
      }
      Backing::Memory(conn) => Ok(conn.clone()),
    }
  }

  /// Run `function` on a connection. For file-backed catalogs the connection
  /// is dropped, and therefore closed, as soon as the call returns.
  async fn call<F, R>(&self, function: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R>
      + Send
      + 'static,
    R: Send + 'static,
  {
    let conn = self.connect().await?;
    Ok(conn.call(function).await?)
  }

  /// Select full rows matching `criteria`.
  async fn select(
    &self,
    criteria: Criteria,
    params: Vec<Value>,
    limit: Option<u32>,
  ) -> Result<Vec<MediaItem>> {
    let limit = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
    let sql = format!("SELECT {COLUMNS} FROM media_items {criteria}{limit}");

    let raws: Vec<RawMediaItem> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawMediaItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMediaItem::into_item).collect()
  }

  async fn select_one(
    &self,
    criteria: Criteria,
    params: Vec<Value>,
  ) -> Result<Option<MediaItem>> {
    Ok(self.select(criteria, params, Some(1)).await?.into_iter().next())
  }

  /// Evaluate an aggregate expression over rows matching `criteria`.
  async fn aggregate(
    &self,
    expression: &'static str,
    criteria: Criteria,
    params: Vec<Value>,
  ) -> Result<i64> {
    let sql = format!("SELECT {expression} FROM media_items {criteria}");
    self
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params_from_iter(params), |row| row.get(0))?)
      })
      .await
  }
}

#[cfg(test)]
impl SqliteCatalog {
  /// Run arbitrary SQL so tests can arrange states the public API cannot.
  pub(crate) async fn execute_raw(
    &self,
    sql: &'static str,
    params: Vec<Value>,
  ) -> Result<usize> {
    self
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params_from_iter(params))?))
      .await
  }
}

fn status_criteria() -> Criteria { Criteria::new().where_("status = ?1") }

fn retention_order(criteria: Criteria) -> Criteria {
  criteria.order_by("created_at").order_by("id")
}

fn status_param(status: ItemStatus) -> Vec<Value> {
  vec![Value::Text(status.as_ref().to_owned())]
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == rusqlite::ErrorCode::ConstraintViolation
        && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

/// What happened inside the update transaction.
enum UpdateOutcome {
  Updated { created_at: String },
  NotFound,
  Reverted,
  Duplicate,
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteCatalog {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert(&self, item: NewMediaItem) -> Result<MediaItem> {
    let item = item.into_validated()?;
    let at = now();

    let source_id    = item.source_id.clone();
    let location_str = encode_path(&item.location)?;
    let size         = encode_size(item.size_bytes)?;
    let status_str   = item.status.as_ref().to_owned();
    let at_str       = encode_dt(at);

    let id: Option<i64> = self
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO media_items
             (source_id, location, size_bytes, status, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![source_id, location_str, size, status_str, at_str],
        );
        match inserted {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    let Some(id) = id else {
      return Err(Error::Duplicate(item.source_id));
    };

    tracing::debug!(id, source_id = %item.source_id, "catalogued media item");

    Ok(MediaItem {
      id,
      source_id:  item.source_id,
      location:   item.location,
      size_bytes: item.size_bytes,
      status:     item.status,
      created_at: at,
      updated_at: at,
    })
  }

  async fn update(&self, item: &MediaItem) -> Result<MediaItem> {
    let at = now();

    let id           = item.id;
    let source_id    = item.source_id.clone();
    let location_str = encode_path(&item.location)?;
    let size         = encode_size(item.size_bytes)?;
    let status       = item.status;
    let at_str       = encode_dt(at);

    let outcome = self
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: Option<(String, String)> = tx
          .query_row(
            "SELECT status, created_at FROM media_items WHERE id = ?1",
            rusqlite::params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let Some((current_status, created_at)) = current else {
          return Ok(UpdateOutcome::NotFound);
        };

        let may_change = ItemStatus::parse(&current_status)
          .map(|current| current.can_become(status))
          .unwrap_or(true);
        if !may_change {
          return Ok(UpdateOutcome::Reverted);
        }

        let updated = tx.execute(
          "UPDATE media_items
           SET source_id  = ?1,
               location   = ?2,
               size_bytes = ?3,
               status     = ?4,
               updated_at = ?5
           WHERE id = ?6",
          rusqlite::params![source_id, location_str, size, status.as_ref(), at_str, id],
        );
        match updated {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Ok(UpdateOutcome::Duplicate),
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(UpdateOutcome::Updated { created_at })
      })
      .await?;

    match outcome {
      UpdateOutcome::Updated { created_at } => Ok(MediaItem {
        created_at: decode_dt(&created_at)?,
        updated_at: at,
        ..item.clone()
      }),
      UpdateOutcome::NotFound => Err(Error::NotFound(item.id)),
      UpdateOutcome::Reverted => Err(Error::StatusReverted(item.id)),
      UpdateOutcome::Duplicate => Err(Error::Duplicate(item.source_id.clone())),
    }
  }

  async fn delete(&self, id: i64) -> Result<bool> {
    let removed = self
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM media_items WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;

    if removed > 0 {
      tracing::info!(id, "removed media item from catalog");
    }
    Ok(removed > 0)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn exists(&self, source_id: &str) -> Result<bool> {
    let count = self
      .aggregate(
        "COUNT(*)",
        Criteria::new().where_("source_id = ?1"),
        vec![Value::Text(source_id.to_owned())],
      )
      .await?;
    Ok(count > 0)
  }

  async fn find_by_id(&self, id: i64) -> Result<Option<MediaItem>> {
    self
      .select_one(Criteria::new().where_("id = ?1"), vec![Value::Integer(id)])
      .await
  }

  async fn find_by_source_id(&self, source_id: &str) -> Result<Option<MediaItem>> {
    self
      .select_one(
        Criteria::new().where_("source_id = ?1"),
        vec![Value::Text(source_id.to_owned())],
      )
      .await
  }

  async fn oldest_not_deleted(&self) -> Result<Option<MediaItem>> {
    self
      .select_one(retention_order(status_criteria()), status_param(ItemStatus::Active))
      .await
  }

  async fn sum_retained_size(&self) -> Result<u64> {
    let sum = self
      .aggregate(
        "COALESCE(SUM(size_bytes), 0)",
        status_criteria(),
        status_param(ItemStatus::Active),
      )
      .await?;
    decode_size(sum)
  }

  async fn list(&self, status: ItemStatus) -> Result<Vec<MediaItem>> {
    self
      .select(retention_order(status_criteria()), status_param(status), None)
      .await
  }

  async fn count(&self, status: ItemStatus) -> Result<u64> {
    let count = self
      .aggregate("COUNT(*)", status_criteria(), status_param(status))
      .await?;
    decode_count(count)
  }
}
