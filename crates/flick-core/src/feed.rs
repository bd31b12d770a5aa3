//! Change notifications for relationship facts.
//!
//! A backend publishes a [`RelationChange`] whenever it inserts or deletes a
//! fact. Consumers subscribe per `(target, kind)` and re-read state when
//! notified; the transport that carries the events is the backend's concern.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::relation::{RelationKey, RelationKind};

/// Default buffer of a [`ChangeHub`]; slower subscribers see
/// [`FeedEvent::Lagged`].
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
  Inserted,
  Deleted,
}

/// A single insert or delete observed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationChange {
  pub key:    RelationKey,
  pub change: ChangeKind,
}

/// What a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
  Changed(RelationChange),
  /// Events were dropped; the subscriber should re-read state.
  Lagged(u64),
}

/// Source of change notifications for a `(target, kind)` pair.
pub trait ChangeFeed: Send + Sync {
  fn subscribe(&self, target_id: Uuid, kind: RelationKind) -> ChangeSubscription;
}

// ─── Hub ─────────────────────────────────────────────────────────────────────

/// In-process fan-out of [`RelationChange`]s, embedded by backends.
///
/// Cloning is cheap; all clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct ChangeHub {
  tx: broadcast::Sender<RelationChange>,
}

impl Default for ChangeHub {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

impl ChangeHub {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  /// Publish a change. Having no subscribers is not an error.
  pub fn publish(&self, change: RelationChange) {
    let receivers = self.tx.send(change).unwrap_or(0);
    tracing::trace!(?change, receivers, "published relation change");
  }
}

impl ChangeFeed for ChangeHub {
  fn subscribe(&self, target_id: Uuid, kind: RelationKind) -> ChangeSubscription {
    ChangeSubscription {
      rx: self.tx.subscribe(),
      target_id,
      kind,
    }
  }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// A receiver filtered down to one `(target, kind)` pair.
#[derive(Debug)]
pub struct ChangeSubscription {
  rx:        broadcast::Receiver<RelationChange>,
  target_id: Uuid,
  kind:      RelationKind,
}

impl ChangeSubscription {
  /// Wait for the next matching event. Returns `None` once every publisher
  /// has been dropped.
  pub async fn recv(&mut self) -> Option<FeedEvent> {
    loop {
      match self.rx.recv().await {
        Ok(change)
          if change.key.target_id == self.target_id
            && change.key.kind == self.kind =>
        {
          return Some(FeedEvent::Changed(change));
        }
        Ok(_) => continue,
        Err(broadcast::error::RecvError::Lagged(n)) => {
          return Some(FeedEvent::Lagged(n));
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}
