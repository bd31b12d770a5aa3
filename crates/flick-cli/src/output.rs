//! Terminal rendering of toggle state and notices.

use flick_core::{
  notify::{Notice, Notifier},
  relation::RelationKind,
  toggle::ToggleState,
};

/// Prints notices to stderr, where a GUI would show a toast.
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
  fn notify(&self, notice: Notice) {
    match &notice {
      Notice::WriteFailed { message, .. } => eprintln!("{notice}: {message}"),
      Notice::SignInRequired { .. } => eprintln!("{notice}"),
    }
  }
}

pub fn plural(kind: RelationKind) -> &'static str {
  match kind {
    RelationKind::Like => "likes",
    RelationKind::Save => "saved videos",
    RelationKind::Subscribe => "subscriptions",
  }
}

/// One line such as `liked (11 likes)` or `not subscribed (3 subscribers)`.
pub fn describe(kind: RelationKind, state: &ToggleState) -> String {
  let (on, off, unit) = match kind {
    RelationKind::Like => ("liked", "not liked", "likes"),
    RelationKind::Save => ("saved", "not saved", "saves"),
    RelationKind::Subscribe => ("subscribed", "not subscribed", "subscribers"),
  };
  let label = if state.is_active { on } else { off };
  let pending = if state.is_pending { ", pending" } else { "" };
  format!("{label} ({} {unit}{pending})", state.count)
}
