//! [`SqliteStore`], the SQLite implementation of [`RelationStore`].

use std::path::Path;

use chrono::Utc;
use flick_core::{
  feed::{ChangeFeed, ChangeHub, ChangeKind, ChangeSubscription, RelationChange},
  relation::{
    CreateOutcome, DeleteOutcome, Relation, RelationKey, RelationKind,
    RelationSnapshot,
  },
  store::RelationStore,
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{KeyParams, RawRelation, encode_dt, encode_kind, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A relationship store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted and every
/// clone publishes to the same change feed.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  hub:  ChangeHub,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, hub: ChangeHub::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, hub: ChangeHub::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn publish(&self, key: RelationKey, change: ChangeKind) {
    self.hub.publish(RelationChange { key, change });
  }
}

// ─── RelationStore impl ──────────────────────────────────────────────────────

impl RelationStore for SqliteStore {
  type Error = crate::Error;

  async fn query(&self, key: RelationKey) -> Result<RelationSnapshot> {
    let p = KeyParams::from(key);

    let (exists, count): (bool, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             EXISTS (SELECT 1 FROM relations
                     WHERE actor_id = ?1 AND target_id = ?2 AND kind = ?3),
             (SELECT COUNT(*) FROM relations
              WHERE target_id = ?2 AND kind = ?3)",
          rusqlite::params![p.actor_id, p.target_id, p.kind],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
      })
      .await?;

    Ok(RelationSnapshot { exists, aggregate_count: count.max(0) as u64 })
  }

  async fn count(&self, target_id: Uuid, kind: RelationKind) -> Result<u64> {
    let target_str = encode_uuid(target_id);
    let kind_str   = encode_kind(kind);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM relations WHERE target_id = ?1 AND kind = ?2",
          rusqlite::params![target_str, kind_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  async fn create(&self, key: RelationKey) -> Result<CreateOutcome> {
    let p      = KeyParams::from(key);
    let at_str = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO relations (actor_id, target_id, kind, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (actor_id, target_id, kind) DO NOTHING",
          rusqlite::params![p.actor_id, p.target_id, p.kind, at_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      tracing::debug!(?key, "relation already exists");
      return Ok(CreateOutcome::AlreadyExists);
    }
    self.publish(key, ChangeKind::Inserted);
    Ok(CreateOutcome::Created)
  }

  async fn delete(&self, key: RelationKey) -> Result<DeleteOutcome> {
    let p = KeyParams::from(key);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM relations
           WHERE actor_id = ?1 AND target_id = ?2 AND kind = ?3",
          rusqlite::params![p.actor_id, p.target_id, p.kind],
        )?)
      })
      .await?;

    if deleted == 0 {
      tracing::debug!(?key, "relation not found");
      return Ok(DeleteOutcome::NotFound);
    }
    self.publish(key, ChangeKind::Deleted);
    Ok(DeleteOutcome::Deleted)
  }

  async fn list(&self, actor_id: Uuid, kind: RelationKind) -> Result<Vec<Relation>> {
    let actor_str = encode_uuid(actor_id);
    let kind_str  = encode_kind(kind);

    let raws: Vec<RawRelation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT actor_id, target_id, kind, created_at
           FROM relations
           WHERE actor_id = ?1 AND kind = ?2
           ORDER BY rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![actor_str, kind_str], RawRelation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRelation::into_relation).collect()
  }
}

impl ChangeFeed for SqliteStore {
  fn subscribe(&self, target_id: Uuid, kind: RelationKind) -> ChangeSubscription {
    self.hub.subscribe(target_id, kind)
  }
}
