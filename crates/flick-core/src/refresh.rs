//! Keeping a tracked pair in step with remote changes made elsewhere.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::{
  feed::{ChangeFeed, FeedEvent},
  notify::Notifier,
  relation::RelationKind,
  store::{IdentityProvider, RelationStore},
  toggle::ToggleController,
};

/// Spawn a task that re-reads `(target_id, kind)` whenever `feed` reports a
/// change for it. The task ends when the feed closes; abort the handle to
/// stop earlier.
pub fn watch<S, I, N, F>(
  controller: Arc<ToggleController<S, I, N>>,
  feed: &F,
  target_id: Uuid,
  kind: RelationKind,
) -> JoinHandle<()>
where
  S: RelationStore + 'static,
  I: IdentityProvider + 'static,
  N: Notifier + 'static,
  F: ChangeFeed + ?Sized,
{
  let mut subscription = feed.subscribe(target_id, kind);
  tokio::spawn(async move {
    while let Some(event) = subscription.recv().await {
      if let FeedEvent::Lagged(missed) = event {
        debug!(%target_id, %kind, missed, "change feed lagged");
      }
      if let Err(e) = controller.refresh(target_id, kind).await {
        debug!(%target_id, %kind, error = %e, "refresh after change failed");
      }
    }
    debug!(%target_id, %kind, "change feed closed");
  })
}
