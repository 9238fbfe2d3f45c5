//! SQL schema for the ytracker catalog.
//!
//! Executed once when a catalog is opened. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per downloaded media unit. Rows are soft-deleted by flipping
-- status to 'evicted' and are kept as an audit trail.
CREATE TABLE IF NOT EXISTS media_items (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id   TEXT    NOT NULL UNIQUE,
    location    TEXT    NOT NULL,
    size_bytes  INTEGER NOT NULL CHECK (size_bytes >= 0),
    status      TEXT    NOT NULL DEFAULT 'active'
                        CHECK (status IN ('active', 'evicted')),
    created_at  TEXT    NOT NULL,   -- RFC 3339 UTC, fixed microsecond width
    updated_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS media_items_source_idx    ON media_items(source_id);
CREATE INDEX IF NOT EXISTS media_items_retention_idx ON media_items(status, created_at, id);

PRAGMA user_version = 1;
";

/// Column list shared by every `SELECT` that decodes a full row.
pub const COLUMNS: &str =
  "id, source_id, location, size_bytes, status, created_at, updated_at";
