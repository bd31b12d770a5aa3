//! Controller tests against a scripted in-memory store.

use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use tokio::sync::Notify;
use uuid::Uuid;

use super::{Shown, ToggleController, ToggleState};
use crate::{
  Error,
  feed::{ChangeFeed, ChangeHub, ChangeKind, RelationChange},
  notify::{Notice, Notifier},
  refresh::watch,
  relation::{
    CreateOutcome, DeleteOutcome, Relation, RelationKey, RelationKind,
    RelationSnapshot, RemoteState,
  },
  store::{IdentityProvider, RelationStore, StaticIdentity},
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("store unavailable")]
struct Unavailable;

/// A store whose failures and latency are set by the test.
#[derive(Default)]
struct ScriptedStore {
  facts:       Mutex<HashSet<RelationKey>>,
  fail_reads:  AtomicBool,
  fail_writes: AtomicBool,
  reads:       AtomicUsize,
  writes:      AtomicUsize,
  /// When set, writes signal `entered` and then wait for `gate`.
  hold_writes: AtomicBool,
  entered:     Notify,
  gate:        Notify,
  /// When set, reads take their snapshot, signal `read_taken` and then wait
  /// for `read_gate` before returning it.
  hold_reads:  AtomicBool,
  read_taken:  Notify,
  read_gate:   Notify,
}

impl ScriptedStore {
  /// Add `n` facts from other actors.
  fn seed(&self, target_id: Uuid, kind: RelationKind, n: usize) {
    let mut facts = self.facts.lock().unwrap();
    for _ in 0..n {
      facts.insert(RelationKey::new(Uuid::new_v4(), target_id, kind));
    }
  }

  fn insert(&self, key: RelationKey) { self.facts.lock().unwrap().insert(key); }

  fn contains(&self, key: RelationKey) -> bool {
    self.facts.lock().unwrap().contains(&key)
  }

  fn tally(&self, target_id: Uuid, kind: RelationKind) -> u64 {
    self
      .facts
      .lock()
      .unwrap()
      .iter()
      .filter(|k| k.target_id == target_id && k.kind == kind)
      .count() as u64
  }

  fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

  async fn before_write(&self) -> Result<(), Unavailable> {
    self.writes.fetch_add(1, Ordering::SeqCst);
    if self.hold_writes.load(Ordering::SeqCst) {
      self.entered.notify_one();
      self.gate.notified().await;
    }
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(Unavailable);
    }
    Ok(())
  }
}

impl RelationStore for ScriptedStore {
  type Error = Unavailable;

  async fn query(&self, key: RelationKey) -> Result<RelationSnapshot, Unavailable> {
    self.reads.fetch_add(1, Ordering::SeqCst);
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(Unavailable);
    }
    let snapshot = RelationSnapshot {
      exists:          self.contains(key),
      aggregate_count: self.tally(key.target_id, key.kind),
    };
    if self.hold_reads.load(Ordering::SeqCst) {
      self.read_taken.notify_one();
      self.read_gate.notified().await;
    }
    Ok(snapshot)
  }

  async fn count(&self, target_id: Uuid, kind: RelationKind) -> Result<u64, Unavailable> {
    Ok(self.tally(target_id, kind))
  }

  async fn create(&self, key: RelationKey) -> Result<CreateOutcome, Unavailable> {
    self.before_write().await?;
    if self.facts.lock().unwrap().insert(key) {
      Ok(CreateOutcome::Created)
    } else {
      Ok(CreateOutcome::AlreadyExists)
    }
  }

  async fn delete(&self, key: RelationKey) -> Result<DeleteOutcome, Unavailable> {
    self.before_write().await?;
    if self.facts.lock().unwrap().remove(&key) {
      Ok(DeleteOutcome::Deleted)
    } else {
      Ok(DeleteOutcome::NotFound)
    }
  }

  async fn list(&self, _: Uuid, _: RelationKind) -> Result<Vec<Relation>, Unavailable> {
    Ok(Vec::new())
  }
}

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<Notice>>);

impl RecordingNotifier {
  fn notices(&self) -> Vec<Notice> { self.0.lock().unwrap().clone() }
}

impl Notifier for RecordingNotifier {
  fn notify(&self, notice: Notice) { self.0.lock().unwrap().push(notice); }
}

#[derive(Debug, thiserror::Error)]
#[error("session expired")]
struct SessionExpired;

struct BrokenIdentity;

impl IdentityProvider for BrokenIdentity {
  type Error = SessionExpired;

  async fn current_actor(&self) -> Result<Option<Uuid>, SessionExpired> {
    Err(SessionExpired)
  }
}

type Controller<I = StaticIdentity> =
  ToggleController<Arc<ScriptedStore>, I, Arc<RecordingNotifier>>;

struct Harness<I = StaticIdentity> {
  store:      Arc<ScriptedStore>,
  notifier:   Arc<RecordingNotifier>,
  controller: Arc<Controller<I>>,
  actor:      Uuid,
  target:     Uuid,
}

fn harness_with<I: IdentityProvider>(actor: Uuid, identity: I) -> Harness<I> {
  let store = Arc::new(ScriptedStore::default());
  let notifier = Arc::new(RecordingNotifier::default());
  let controller = Arc::new(ToggleController::with_notifier(
    store.clone(),
    identity,
    notifier.clone(),
  ));
  Harness { store, notifier, controller, actor, target: Uuid::new_v4() }
}

fn harness() -> Harness {
  let actor = Uuid::new_v4();
  harness_with(actor, StaticIdentity(Some(actor)))
}

fn anonymous() -> Harness {
  harness_with(Uuid::new_v4(), StaticIdentity(None))
}

fn idle(is_active: bool, count: u64) -> (bool, u64, bool) { (is_active, count, false) }

fn shape(s: ToggleState) -> (bool, u64, bool) { (s.is_active, s.count, s.is_pending) }

const LIKE: RelationKind = RelationKind::Like;

// ─── initialize ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn initialize_reads_authoritative_state() {
  let h = harness();
  h.store.seed(h.target, LIKE, 3);
  h.store.insert(RelationKey::new(h.actor, h.target, LIKE));

  let state = h.controller.initialize(h.target, LIKE).await.unwrap();
  assert_eq!(shape(state), idle(true, 4));
  assert_eq!(state.remote, RemoteState::Present);
  assert_eq!(h.controller.state(h.target, LIKE), Some(state));
}

#[tokio::test]
async fn initialize_anonymous_is_inactive_and_zero() {
  let h = anonymous();
  h.store.seed(h.target, LIKE, 5);

  let state = h.controller.initialize(h.target, LIKE).await.unwrap();
  assert_eq!(shape(state), idle(false, 0));
  assert_eq!(h.store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initialize_failure_defaults_to_inactive() {
  let h = harness();
  h.store.seed(h.target, LIKE, 7);
  h.store.fail_reads.store(true, Ordering::SeqCst);

  let err = h.controller.initialize(h.target, LIKE).await.unwrap_err();
  assert!(matches!(err, Error::Fetch(_)));

  let state = h.controller.state(h.target, LIKE).unwrap();
  assert_eq!(shape(state), idle(false, 0));
  assert_eq!(state.remote, RemoteState::Unknown);
  // Read failures are silent.
  assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_state() {
  let h = harness();
  h.store.seed(h.target, LIKE, 2);
  h.controller.initialize(h.target, LIKE).await.unwrap();

  h.store.fail_reads.store(true, Ordering::SeqCst);
  assert!(h.controller.refresh(h.target, LIKE).await.is_err());
  assert_eq!(shape(h.controller.state(h.target, LIKE).unwrap()), idle(false, 2));
}

#[tokio::test]
async fn identity_failure_during_initialize_is_a_fetch_error() {
  let h = harness_with(Uuid::new_v4(), BrokenIdentity);
  let err = h.controller.initialize(h.target, LIKE).await.unwrap_err();
  assert_eq!(err, Error::Fetch("session expired".into()));
}

// ─── toggle: scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn activating_toggle_settles_with_incremented_count() {
  let h = harness();
  h.store.seed(h.target, LIKE, 10);
  let before = h.controller.initialize(h.target, LIKE).await.unwrap();
  assert_eq!(shape(before), idle(false, 10));

  let after = h.controller.toggle(h.target, LIKE).await.unwrap();
  assert_eq!(shape(after), idle(true, 11));
  assert_eq!(after.remote, RemoteState::Present);
  assert!(h.store.contains(RelationKey::new(h.actor, h.target, LIKE)));
  assert_eq!(h.store.writes(), 1);
}

#[tokio::test]
async fn failed_toggle_rolls_back_and_notifies() {
  let h = harness();
  h.store.seed(h.target, LIKE, 10);
  h.store.insert(RelationKey::new(h.actor, h.target, LIKE));
  let before = h.controller.initialize(h.target, LIKE).await.unwrap();
  assert_eq!(shape(before), idle(true, 11));

  h.store.fail_writes.store(true, Ordering::SeqCst);
  let err = h.controller.toggle(h.target, LIKE).await.unwrap_err();
  assert_eq!(err, Error::RemoteWrite("store unavailable".into()));

  let after = h.controller.state(h.target, LIKE).unwrap();
  assert_eq!(after, before);
  assert_eq!(h.store.writes(), 1);
  assert_eq!(h.notifier.notices(), vec![Notice::WriteFailed {
    kind:      LIKE,
    target_id: h.target,
    message:   "store unavailable".into(),
  }]);
}

#[tokio::test]
async fn anonymous_toggle_is_rejected_without_writes() {
  let h = anonymous();
  h.controller.initialize(h.target, LIKE).await.unwrap();

  let err = h.controller.toggle(h.target, LIKE).await.unwrap_err();
  assert_eq!(err, Error::AuthRequired);
  assert_eq!(shape(h.controller.state(h.target, LIKE).unwrap()), idle(false, 0));
  assert_eq!(h.store.writes(), 0);
  assert_eq!(h.notifier.notices(), vec![Notice::SignInRequired { kind: LIKE }]);
}

#[tokio::test]
async fn second_toggle_while_pending_is_a_noop() {
  let h = harness();
  h.store.seed(h.target, LIKE, 5);
  h.controller.initialize(h.target, LIKE).await.unwrap();
  h.store.hold_writes.store(true, Ordering::SeqCst);

  let first = tokio::spawn({
    let controller = h.controller.clone();
    let target = h.target;
    async move { controller.toggle(target, LIKE).await }
  });
  h.store.entered.notified().await;

  let second = h.controller.toggle(h.target, LIKE).await.unwrap();
  assert_eq!(shape(second), (true, 6, true));

  h.store.gate.notify_one();
  let settled = first.await.unwrap().unwrap();
  assert_eq!(shape(settled), idle(true, 6));
  assert_eq!(h.store.writes(), 1);
}

// ─── toggle: properties ──────────────────────────────────────────────────────

#[tokio::test]
async fn optimistic_value_is_visible_before_the_write_resolves() {
  let h = harness();
  h.store.seed(h.target, RelationKind::Subscribe, 1);
  h.controller.initialize(h.target, RelationKind::Subscribe).await.unwrap();
  h.store.hold_writes.store(true, Ordering::SeqCst);

  let pending = tokio::spawn({
    let controller = h.controller.clone();
    let target = h.target;
    async move { controller.toggle(target, RelationKind::Subscribe).await }
  });
  h.store.entered.notified().await;

  let during = h.controller.state(h.target, RelationKind::Subscribe).unwrap();
  assert_eq!(shape(during), (true, 2, true));

  h.store.gate.notify_one();
  pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn rollback_after_pending_restores_exact_snapshot() {
  let h = harness();
  h.store.seed(h.target, LIKE, 4);
  let before = h.controller.initialize(h.target, LIKE).await.unwrap();
  h.store.hold_writes.store(true, Ordering::SeqCst);
  h.store.fail_writes.store(true, Ordering::SeqCst);

  let pending = tokio::spawn({
    let controller = h.controller.clone();
    let target = h.target;
    async move { controller.toggle(target, LIKE).await }
  });
  h.store.entered.notified().await;
  assert!(h.controller.state(h.target, LIKE).unwrap().is_pending);

  h.store.gate.notify_one();
  assert!(pending.await.unwrap().is_err());
  assert_eq!(h.controller.state(h.target, LIKE).unwrap(), before);
}

#[tokio::test]
async fn duplicate_create_is_benign() {
  let h = harness();
  let key = RelationKey::new(h.actor, h.target, RelationKind::Save);
  h.controller.initialize(h.target, RelationKind::Save).await.unwrap();
  // Another client of the same actor saved it in the meantime.
  h.store.insert(key);

  let state = h.controller.toggle(h.target, RelationKind::Save).await.unwrap();
  assert!(state.is_active);
  assert_eq!(state.remote, RemoteState::Present);
  assert!(h.notifier.notices().is_empty());
  assert!(h.store.contains(key));
}

#[tokio::test]
async fn deleting_a_missing_fact_is_benign() {
  let h = harness();
  let key = RelationKey::new(h.actor, h.target, LIKE);
  h.store.insert(key);
  h.controller.initialize(h.target, LIKE).await.unwrap();
  h.store.facts.lock().unwrap().remove(&key);

  let state = h.controller.toggle(h.target, LIKE).await.unwrap();
  assert_eq!(shape(state), idle(false, 0));
  assert_eq!(state.remote, RemoteState::Absent);
  assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn toggling_twice_returns_to_start_with_two_writes() {
  let h = harness();
  h.store.seed(h.target, LIKE, 8);
  let before = h.controller.initialize(h.target, LIKE).await.unwrap();

  h.controller.toggle(h.target, LIKE).await.unwrap();
  let after = h.controller.toggle(h.target, LIKE).await.unwrap();
  assert_eq!(shape(after), shape(before));
  assert_eq!(h.store.writes(), 2);
}

#[test]
fn count_never_goes_negative() {
  let shown = Shown { is_active: true, count: 0, remote: RemoteState::Present };
  let next = shown.flipped();
  assert!(!next.is_active);
  assert_eq!(next.count, 0);
  assert_eq!(next.flipped().count, 1);
}

#[tokio::test]
async fn identity_failure_during_toggle_is_a_write_failure() {
  let h = harness_with(Uuid::new_v4(), BrokenIdentity);
  let err = h.controller.toggle(h.target, LIKE).await.unwrap_err();
  assert!(matches!(err, Error::RemoteWrite(_)));
  assert_eq!(h.store.writes(), 0);
  assert!(h.controller.state(h.target, LIKE).is_none());
}

#[tokio::test]
async fn pairs_are_independent() {
  let h = harness();
  h.controller.initialize(h.target, LIKE).await.unwrap();
  h.controller.initialize(h.target, RelationKind::Save).await.unwrap();

  h.controller.toggle(h.target, LIKE).await.unwrap();
  assert!(h.controller.state(h.target, LIKE).unwrap().is_active);
  assert!(!h.controller.state(h.target, RelationKind::Save).unwrap().is_active);
}

// ─── release / refresh ───────────────────────────────────────────────────────

#[tokio::test]
async fn result_after_release_is_not_applied() {
  let h = harness();
  h.controller.initialize(h.target, LIKE).await.unwrap();
  h.store.hold_writes.store(true, Ordering::SeqCst);

  let pending = tokio::spawn({
    let controller = h.controller.clone();
    let target = h.target;
    async move { controller.toggle(target, LIKE).await }
  });
  h.store.entered.notified().await;
  h.controller.release(h.target, LIKE);

  h.store.gate.notify_one();
  let settled = pending.await.unwrap().unwrap();
  assert!(settled.is_active);
  assert!(h.controller.state(h.target, LIKE).is_none());
  // The write itself still happened remotely.
  assert!(h.store.contains(RelationKey::new(h.actor, h.target, LIKE)));
}

#[tokio::test]
async fn refresh_leaves_pending_pair_alone() {
  let h = harness();
  h.controller.initialize(h.target, LIKE).await.unwrap();
  h.store.hold_writes.store(true, Ordering::SeqCst);

  let pending = tokio::spawn({
    let controller = h.controller.clone();
    let target = h.target;
    async move { controller.toggle(target, LIKE).await }
  });
  h.store.entered.notified().await;
  let reads_before = h.store.reads.load(Ordering::SeqCst);

  let during = h.controller.refresh(h.target, LIKE).await.unwrap();
  assert_eq!(shape(during), (true, 1, true));
  assert_eq!(h.store.reads.load(Ordering::SeqCst), reads_before);

  h.store.gate.notify_one();
  pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn stale_read_does_not_overwrite_settled_toggle() {
  let h = harness();
  h.controller.initialize(h.target, LIKE).await.unwrap();
  h.store.hold_reads.store(true, Ordering::SeqCst);

  let read = tokio::spawn({
    let controller = h.controller.clone();
    let target = h.target;
    async move { controller.refresh(target, LIKE).await }
  });
  h.store.read_taken.notified().await;

  let settled = h.controller.toggle(h.target, LIKE).await.unwrap();
  assert_eq!(shape(settled), idle(true, 1));

  h.store.read_gate.notify_one();
  read.await.unwrap().unwrap();

  let state = h.controller.state(h.target, LIKE).unwrap();
  assert_eq!(state, settled);
  assert_eq!(state.remote, RemoteState::Present);
  assert!(h.store.contains(RelationKey::new(h.actor, h.target, LIKE)));
}

#[tokio::test]
async fn older_read_landing_last_is_discarded() {
  let h = harness();
  h.controller.initialize(h.target, LIKE).await.unwrap();
  h.store.hold_reads.store(true, Ordering::SeqCst);

  let older = tokio::spawn({
    let controller = h.controller.clone();
    let target = h.target;
    async move { controller.refresh(target, LIKE).await }
  });
  h.store.read_taken.notified().await;

  h.store.hold_reads.store(false, Ordering::SeqCst);
  h.store.seed(h.target, LIKE, 1);
  let newer = h.controller.refresh(h.target, LIKE).await.unwrap();
  assert_eq!(shape(newer), idle(false, 1));

  h.store.read_gate.notify_one();
  older.await.unwrap().unwrap();
  assert_eq!(shape(h.controller.state(h.target, LIKE).unwrap()), idle(false, 1));
}

#[tokio::test]
async fn watch_refreshes_on_remote_change() {
  let h = harness();
  let hub = ChangeHub::default();
  h.controller.initialize(h.target, LIKE).await.unwrap();
  let task = watch(h.controller.clone(), &hub, h.target, LIKE);

  // Another actor likes the target.
  let other = RelationKey::new(Uuid::new_v4(), h.target, LIKE);
  h.store.insert(other);
  hub.publish(RelationChange { key: other, change: ChangeKind::Inserted });

  for _ in 0..100 {
    if h.controller.state(h.target, LIKE).unwrap().count == 1 {
      break;
    }
    tokio::task::yield_now().await;
  }
  assert_eq!(shape(h.controller.state(h.target, LIKE).unwrap()), idle(false, 1));

  drop(hub);
  task.await.unwrap();
}

#[tokio::test]
async fn watch_ignores_other_targets() {
  let h = harness();
  let hub = ChangeHub::default();
  let mut witness = hub.subscribe(h.target, LIKE);
  h.controller.initialize(h.target, LIKE).await.unwrap();
  let reads_before = h.store.reads.load(Ordering::SeqCst);
  let task = watch(h.controller.clone(), &hub, h.target, LIKE);

  let elsewhere = RelationKey::new(h.actor, Uuid::new_v4(), LIKE);
  hub.publish(RelationChange { key: elsewhere, change: ChangeKind::Deleted });
  drop(hub);

  task.await.unwrap();
  assert_eq!(h.store.reads.load(Ordering::SeqCst), reads_before);
  assert_eq!(witness.recv().await, None);
}

#[tokio::test]
async fn watch_rereads_after_lag() {
  let h = harness();
  let hub = ChangeHub::new(1);
  h.controller.initialize(h.target, LIKE).await.unwrap();
  let reads_before = h.store.reads.load(Ordering::SeqCst);
  let task = watch(h.controller.clone(), &hub, h.target, LIKE);

  // The change for this pair is among the events the subscriber misses.
  h.store.seed(h.target, LIKE, 1);
  for _ in 0..3 {
    let elsewhere = RelationKey::new(h.actor, Uuid::new_v4(), LIKE);
    hub.publish(RelationChange { key: elsewhere, change: ChangeKind::Inserted });
  }
  drop(hub);

  task.await.unwrap();
  assert_eq!(h.store.reads.load(Ordering::SeqCst), reads_before + 1);
  assert_eq!(shape(h.controller.state(h.target, LIKE).unwrap()), idle(false, 1));
}
