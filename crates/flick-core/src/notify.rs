//! User-visible notices raised by the toggle controller.

use uuid::Uuid;

use crate::relation::RelationKind;

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  /// An anonymous session tried to toggle; prompt for sign-in.
  SignInRequired { kind: RelationKind },
  /// A write failed and the display was rolled back.
  WriteFailed {
    kind:      RelationKind,
    target_id: Uuid,
    message:   String,
  },
}

impl std::fmt::Display for Notice {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Notice::SignInRequired { kind } => {
        write!(f, "Please sign in to {}", verb(*kind))
      }
      Notice::WriteFailed { kind, .. } => {
        write!(f, "Failed to update {}", noun(*kind))
      }
    }
  }
}

fn verb(kind: RelationKind) -> &'static str {
  match kind {
    RelationKind::Like => "like videos",
    RelationKind::Save => "save videos",
    RelationKind::Subscribe => "subscribe to channels",
  }
}

fn noun(kind: RelationKind) -> &'static str {
  match kind {
    RelationKind::Like => "like",
    RelationKind::Save => "saved video",
    RelationKind::Subscribe => "subscription",
  }
}

/// Delivery channel for [`Notice`]s (a toast, stderr, a log line).
pub trait Notifier: Send + Sync {
  fn notify(&self, notice: Notice);
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
  fn notify(&self, notice: Notice) { (**self).notify(notice) }
}

/// Reports notices through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn notify(&self, notice: Notice) {
    match &notice {
      Notice::SignInRequired { .. } => tracing::info!("{notice}"),
      Notice::WriteFailed { target_id, message, .. } => {
        tracing::warn!(%target_id, %message, "{notice}")
      }
    }
  }
}
