//! Error types for `flick-core`.

use thiserror::Error;

/// Failures surfaced at the toggle controller boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// No actor is signed in; nothing was mutated.
  #[error("sign-in required")]
  AuthRequired,

  /// Reading the authoritative state failed; display fell back to a safe
  /// default.
  #[error("failed to fetch relationship state: {0}")]
  Fetch(String),

  /// The create/delete call failed; optimistic state was rolled back.
  #[error("failed to update relationship: {0}")]
  RemoteWrite(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
