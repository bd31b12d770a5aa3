//! Collaborator contracts consumed by the toggle controller.
//!
//! The traits are implemented by storage backends (`flick-store-sqlite`) and
//! remote clients (`flick-cli`). The controller depends on these
//! abstractions, never on a concrete backend, so tests can substitute a
//! scripted store and a fake identity.

use std::{future::Future, sync::Arc};

use uuid::Uuid;

use crate::relation::{
  CreateOutcome, DeleteOutcome, Relation, RelationKey, RelationKind,
  RelationSnapshot,
};

// ─── Relationship store ──────────────────────────────────────────────────────

/// The authoritative, durable home of relationship facts.
///
/// Implementations must enforce at most one fact per [`RelationKey`]; a
/// duplicate create reports [`CreateOutcome::AlreadyExists`] rather than
/// failing.
pub trait RelationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether `key` exists, plus the number of facts for its target and kind.
  fn query(
    &self,
    key: RelationKey,
  ) -> impl Future<Output = Result<RelationSnapshot, Self::Error>> + Send + '_;

  /// Number of facts of `kind` held towards `target_id` by any actor.
  fn count(
    &self,
    target_id: Uuid,
    kind: RelationKind,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn create(
    &self,
    key: RelationKey,
  ) -> impl Future<Output = Result<CreateOutcome, Self::Error>> + Send + '_;

  fn delete(
    &self,
    key: RelationKey,
  ) -> impl Future<Output = Result<DeleteOutcome, Self::Error>> + Send + '_;

  /// Every fact of `kind` held by `actor_id`, newest first (saved videos,
  /// subscriptions).
  fn list(
    &self,
    actor_id: Uuid,
    kind: RelationKind,
  ) -> impl Future<Output = Result<Vec<Relation>, Self::Error>> + Send + '_;
}

impl<T: RelationStore + ?Sized> RelationStore for Arc<T> {
  type Error = T::Error;

  fn query(
    &self,
    key: RelationKey,
  ) -> impl Future<Output = Result<RelationSnapshot, Self::Error>> + Send + '_ {
    (**self).query(key)
  }

  fn count(
    &self,
    target_id: Uuid,
    kind: RelationKind,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_ {
    (**self).count(target_id, kind)
  }

  fn create(
    &self,
    key: RelationKey,
  ) -> impl Future<Output = Result<CreateOutcome, Self::Error>> + Send + '_ {
    (**self).create(key)
  }

  fn delete(
    &self,
    key: RelationKey,
  ) -> impl Future<Output = Result<DeleteOutcome, Self::Error>> + Send + '_ {
    (**self).delete(key)
  }

  fn list(
    &self,
    actor_id: Uuid,
    kind: RelationKind,
  ) -> impl Future<Output = Result<Vec<Relation>, Self::Error>> + Send + '_ {
    (**self).list(actor_id, kind)
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Accessor for the signed-in actor of the current session.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `None` means the session is anonymous.
  fn current_actor(
    &self,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
  type Error = T::Error;

  fn current_actor(
    &self,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_ {
    (**self).current_actor()
  }
}

/// An identity fixed at construction time.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentity(pub Option<Uuid>);

impl IdentityProvider for StaticIdentity {
  type Error = std::convert::Infallible;

  async fn current_actor(&self) -> Result<Option<Uuid>, Self::Error> {
    Ok(self.0)
  }
}
