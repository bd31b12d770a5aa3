//! Relationship facts: "actor X likes / saved / subscribed to target Y".
//!
//! At most one fact exists per [`RelationKey`]. The remote store is the
//! authority for that constraint; everything here is plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The relationship an actor can hold towards a target entity.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RelationKind {
  /// A like on a video or post.
  Like,
  /// A video bookmarked for later.
  Save,
  /// A subscription to a channel.
  Subscribe,
}

impl RelationKind {
  pub const ALL: [RelationKind; 3] =
    [RelationKind::Like, RelationKind::Save, RelationKind::Subscribe];
}

// ─── Key ─────────────────────────────────────────────────────────────────────

/// The uniqueness tuple of a relationship fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationKey {
  pub actor_id:  Uuid,
  pub target_id: Uuid,
  pub kind:      RelationKind,
}

impl RelationKey {
  pub fn new(actor_id: Uuid, target_id: Uuid, kind: RelationKind) -> Self {
    Self { actor_id, target_id, kind }
  }
}

/// A persisted relationship fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
  #[serde(flatten)]
  pub key:        RelationKey,
  /// Server-assigned; never changes after creation.
  pub created_at: DateTime<Utc>,
}

// ─── Store results ───────────────────────────────────────────────────────────

/// Authoritative answer to "does this fact exist, and how many actors hold
/// this relationship towards the target?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationSnapshot {
  pub exists:          bool,
  pub aggregate_count: u64,
}

/// Result of creating a fact. A duplicate is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
  Created,
  AlreadyExists,
}

/// Result of deleting a fact. A missing fact is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
  Deleted,
  NotFound,
}

/// What the client knows about the remote fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
  /// No authoritative round trip has completed yet.
  #[default]
  Unknown,
  Present,
  Absent,
}

impl From<bool> for RemoteState {
  fn from(exists: bool) -> Self {
    if exists { Self::Present } else { Self::Absent }
  }
}
