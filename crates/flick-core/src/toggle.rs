//! The optimistic toggle controller.
//!
//! Each `(target, kind)` pair the controller has seen is tracked as a small
//! state machine:
//!
//! ```text
//!   Idle(active, count) ──toggle()──▶ Pending(flipped, snapshot)
//!          ▲                                  │
//!          └──── success: keep flipped ───────┤
//!          └──── failure: restore snapshot ───┘
//! ```
//!
//! The flipped value is visible as soon as `toggle` is called, before the
//! remote write resolves. While a pair is pending, further toggles for it are
//! no-ops, so at most one write per pair is ever in flight. Pairs do not
//! share state with one another.

use std::{
  collections::HashMap,
  sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
  },
};

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  notify::{Notice, Notifier, TracingNotifier},
  relation::{CreateOutcome, DeleteOutcome, RelationKey, RelationKind, RemoteState},
  store::{IdentityProvider, RelationStore},
};

// ─── Public state ────────────────────────────────────────────────────────────

/// What a view renders for one `(target, kind)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ToggleState {
  pub is_active:  bool,
  pub count:      u64,
  /// A remote write for this pair is in flight.
  pub is_pending: bool,
  /// Last authoritative knowledge of the remote fact.
  pub remote:     RemoteState,
}

// ─── Per-pair bookkeeping ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Shown {
  is_active: bool,
  count:     u64,
  remote:    RemoteState,
}

impl Shown {
  /// The optimistic next value: flip, and move the count with it. The count
  /// never goes below zero.
  fn flipped(self) -> Self {
    let count = if self.is_active {
      self.count.saturating_sub(1)
    } else {
      self.count.saturating_add(1)
    };
    Self { is_active: !self.is_active, count, ..self }
  }

  fn anonymous() -> Self {
    Self { is_active: false, count: 0, remote: RemoteState::Absent }
  }

  fn idle(self) -> ToggleState {
    ToggleState {
      is_active:  self.is_active,
      count:      self.count,
      is_pending: false,
      remote:     self.remote,
    }
  }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
  Idle,
  Pending { snapshot: Shown },
}

#[derive(Debug)]
struct Entry {
  /// Changes whenever the pair is released and re-created; results carrying
  /// a stale epoch are dropped.
  epoch:   u64,
  /// Bumped when a read starts and when a toggle applies or settles. A read
  /// whose version is no longer current lands on a display that has moved
  /// on, and is discarded.
  version: u64,
  shown:   Shown,
  phase:   Phase,
}

impl Entry {
  fn state(&self) -> ToggleState {
    ToggleState {
      is_pending: matches!(self.phase, Phase::Pending { .. }),
      ..self.shown.idle()
    }
  }
}

type Slot = (Uuid, RelationKind);

// ─── Controller ──────────────────────────────────────────────────────────────

/// Applies relationship toggles optimistically against a [`RelationStore`]
/// and reconciles with the remote result.
///
/// Share it between tasks behind an `Arc`; the internal lock is never held
/// across an `.await`.
pub struct ToggleController<S, I, N = TracingNotifier> {
  store:      S,
  identity:   I,
  notifier:   N,
  entries:    Mutex<HashMap<Slot, Entry>>,
  next_epoch: AtomicU64,
}

impl<S, I> ToggleController<S, I>
where
  S: RelationStore,
  I: IdentityProvider,
{
  /// A controller that reports notices through `tracing`.
  pub fn new(store: S, identity: I) -> Self {
    Self::with_notifier(store, identity, TracingNotifier)
  }
}

impl<S, I, N> ToggleController<S, I, N>
where
  S: RelationStore,
  I: IdentityProvider,
  N: Notifier,
{
  pub fn with_notifier(store: S, identity: I, notifier: N) -> Self {
    Self {
      store,
      identity,
      notifier,
      entries: Mutex::new(HashMap::new()),
      next_epoch: AtomicU64::new(0),
    }
  }

  /// Current display state, or `None` if the pair is not tracked.
  pub fn state(&self, target_id: Uuid, kind: RelationKind) -> Option<ToggleState> {
    self.entries().get(&(target_id, kind)).map(Entry::state)
  }

  /// Stop tracking a pair. An in-flight write still completes remotely but
  /// its result is not applied anywhere.
  pub fn release(&self, target_id: Uuid, kind: RelationKind) {
    if self.entries().remove(&(target_id, kind)).is_some() {
      debug!(%target_id, %kind, "released toggle");
    }
  }

  /// Load the authoritative state for the current actor.
  ///
  /// Anonymous sessions get an inactive pair with a zero count. On a read
  /// failure the pair keeps whatever it showed before (inactive and zero if
  /// it is new) and [`Error::Fetch`] is returned.
  pub async fn initialize(
    &self,
    target_id: Uuid,
    kind: RelationKind,
  ) -> Result<ToggleState> {
    let slot = (target_id, kind);
    let (epoch, version) = {
      let mut entries = self.entries();
      let entry = self.entry(&mut entries, slot);
      entry.version += 1;
      (entry.epoch, entry.version)
    };

    let fetched = self.fetch(target_id, kind).await;

    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(&slot).filter(|e| e.epoch == epoch) else {
      debug!(%target_id, %kind, "released before initial read settled");
      return fetched.map(Shown::idle);
    };

    match fetched {
      // A pending toggle owns the display until it settles.
      Ok(shown)
        if entry.version == version && matches!(entry.phase, Phase::Idle) =>
      {
        entry.shown = shown;
        Ok(entry.state())
      }
      Ok(_) => {
        debug!(%target_id, %kind, "display moved on during read; discarded");
        Ok(entry.state())
      }
      Err(e) => {
        warn!(%target_id, %kind, error = %e, "read failed; keeping previous state");
        Err(e)
      }
    }
  }

  /// Re-read the authoritative state unless a toggle is pending.
  pub async fn refresh(
    &self,
    target_id: Uuid,
    kind: RelationKind,
  ) -> Result<ToggleState> {
    if let Some(state) = self.state(target_id, kind).filter(|s| s.is_pending) {
      return Ok(state);
    }
    self.initialize(target_id, kind).await
  }

  /// Flip the relationship for the current actor.
  ///
  /// Returns the settled state. If a toggle for the same pair is already in
  /// flight, returns the pending state immediately without touching the
  /// store.
  pub async fn toggle(
    &self,
    target_id: Uuid,
    kind: RelationKind,
  ) -> Result<ToggleState> {
    let actor_id = match self.identity.current_actor().await {
      Ok(Some(actor_id)) => actor_id,
      Ok(None) => {
        self.notifier.notify(Notice::SignInRequired { kind });
        return Err(Error::AuthRequired);
      }
      Err(e) => {
        let message = e.to_string();
        warn!(%target_id, %kind, error = %message, "identity lookup failed");
        self.notifier.notify(Notice::WriteFailed {
          kind,
          target_id,
          message: message.clone(),
        });
        return Err(Error::RemoteWrite(message));
      }
    };

    let slot = (target_id, kind);
    let (epoch, optimistic) = {
      let mut entries = self.entries();
      let entry = self.entry(&mut entries, slot);
      if let Phase::Pending { .. } = entry.phase {
        debug!(%target_id, %kind, "toggle already in flight");
        return Ok(entry.state());
      }
      let snapshot = entry.shown;
      entry.shown = snapshot.flipped();
      entry.phase = Phase::Pending { snapshot };
      entry.version += 1;
      (entry.epoch, entry.shown)
    };
    debug!(
      %target_id, %kind,
      active = optimistic.is_active, count = optimistic.count,
      "applied optimistic toggle"
    );

    let key = RelationKey::new(actor_id, target_id, kind);
    let written = if optimistic.is_active {
      self
        .store
        .create(key)
        .await
        .map(|outcome| {
          if outcome == CreateOutcome::AlreadyExists {
            debug!(%target_id, %kind, "relation already existed");
          }
          RemoteState::Present
        })
        .map_err(|e| e.to_string())
    } else {
      self
        .store
        .delete(key)
        .await
        .map(|outcome| {
          if outcome == DeleteOutcome::NotFound {
            debug!(%target_id, %kind, "relation was already gone");
          }
          RemoteState::Absent
        })
        .map_err(|e| e.to_string())
    };

    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(&slot).filter(|e| e.epoch == epoch) else {
      debug!(%target_id, %kind, "released while pending; result dropped");
      return written
        .map(|remote| Shown { remote, ..optimistic }.idle())
        .map_err(Error::RemoteWrite);
    };

    let snapshot = match entry.phase {
      Phase::Pending { snapshot } => snapshot,
      Phase::Idle => entry.shown,
    };
    entry.phase = Phase::Idle;
    entry.version += 1;

    match written {
      Ok(remote) => {
        entry.shown.remote = remote;
        Ok(entry.state())
      }
      Err(message) => {
        entry.shown = snapshot;
        drop(entries);
        warn!(%target_id, %kind, error = %message, "write failed; rolled back");
        self.notifier.notify(Notice::WriteFailed {
          kind,
          target_id,
          message: message.clone(),
        });
        Err(Error::RemoteWrite(message))
      }
    }
  }

  async fn fetch(&self, target_id: Uuid, kind: RelationKind) -> Result<Shown> {
    let actor = self
      .identity
      .current_actor()
      .await
      .map_err(|e| Error::Fetch(e.to_string()))?;
    let Some(actor_id) = actor else {
      return Ok(Shown::anonymous());
    };

    let snapshot = self
      .store
      .query(RelationKey::new(actor_id, target_id, kind))
      .await
      .map_err(|e| Error::Fetch(e.to_string()))?;

    Ok(Shown {
      is_active: snapshot.exists,
      count:     snapshot.aggregate_count,
      remote:    snapshot.exists.into(),
    })
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<Slot, Entry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn entry<'a>(
    &self,
    entries: &'a mut HashMap<Slot, Entry>,
    slot: Slot,
  ) -> &'a mut Entry {
    entries.entry(slot).or_insert_with(|| Entry {
      epoch:   self.next_epoch.fetch_add(1, Ordering::Relaxed),
      version: 0,
      shown:   Shown::default(),
      phase:   Phase::Idle,
    })
  }
}

#[cfg(test)]
mod tests;
