//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs are hyphenated lowercase strings,
//! and kinds use their lowercase names.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use flick_core::relation::{Relation, RelationKey, RelationKind};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RelationKind ─────────────────────────────────────────────────────────────

pub fn encode_kind(kind: RelationKind) -> &'static str { kind.into() }

pub fn decode_kind(s: &str) -> Result<RelationKind> {
  RelationKind::from_str(s).map_err(|_| Error::UnknownKind(s.to_owned()))
}

// ─── Key columns ──────────────────────────────────────────────────────────────

/// The three key columns, ready to bind as `?1, ?2, ?3`.
pub struct KeyParams {
  pub actor_id:  String,
  pub target_id: String,
  pub kind:      &'static str,
}

impl From<RelationKey> for KeyParams {
  fn from(key: RelationKey) -> Self {
    Self {
      actor_id:  encode_uuid(key.actor_id),
      target_id: encode_uuid(key.target_id),
      kind:      encode_kind(key.kind),
    }
  }
}

// ─── Raw rows ─────────────────────────────────────────────────────────────────

/// A `relations` row as read, before validation.
pub struct RawRelation {
  pub actor_id:   String,
  pub target_id:  String,
  pub kind:       String,
  pub created_at: String,
}

impl RawRelation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      actor_id:   row.get(0)?,
      target_id:  row.get(1)?,
      kind:       row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_relation(self) -> Result<Relation> {
    Ok(Relation {
      key:        RelationKey {
        actor_id:  decode_uuid(&self.actor_id)?,
        target_id: decode_uuid(&self.target_id)?,
        kind:      decode_kind(&self.kind)?,
      },
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
