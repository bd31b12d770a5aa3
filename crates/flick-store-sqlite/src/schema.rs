//! SQL schema for the Flick SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per (actor, target, kind). A second insert for the same tuple is a
-- conflict, never a second row.
CREATE TABLE IF NOT EXISTS relations (
    actor_id   TEXT NOT NULL,
    target_id  TEXT NOT NULL,
    kind       TEXT NOT NULL,   -- 'like' | 'save' | 'subscribe'
    created_at TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    UNIQUE (actor_id, target_id, kind)
);

CREATE INDEX IF NOT EXISTS relations_target_idx ON relations(target_id, kind);
CREATE INDEX IF NOT EXISTS relations_actor_idx  ON relations(actor_id, kind);

PRAGMA user_version = 1;
";
