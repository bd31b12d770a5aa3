//! JSON REST API for Flick relationship facts.
//!
//! Exposes an axum [`Router`] backed by any
//! [`flick_core::store::RelationStore`]. Actors authenticate with HTTP Basic
//! credentials checked against the configured accounts; reads are also open
//! to anonymous callers.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/api/me` | Signed-in actor and profile; 401 if anonymous |
//! | `GET`    | `/api/me/relations/{kind}` | The actor's facts of one kind |
//! | `GET`    | `/api/relations/{kind}/{target_id}` | [`RelationSnapshot`](flick_core::relation::RelationSnapshot) |
//! | `PUT`    | `/api/relations/{kind}/{target_id}` | 201 created / 200 already exists |
//! | `DELETE` | `/api/relations/{kind}/{target_id}` | `deleted` / `not_found` |

pub mod auth;
pub mod error;
pub mod me;
pub mod relations;

pub use error::ApiError;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, routing::get};
use flick_core::store::RelationStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::Account;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and `FLICK_*`
/// environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub accounts:   Vec<Account>,
}

impl ServerConfig {
  /// Layer built-in defaults, the TOML file at `path` (optional) and
  /// `FLICK_*` environment variables, later sources winning.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 5232)?
      .set_default("store_path", "~/.local/share/flick/flick.db")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("FLICK"))
      .build()?
      .try_deserialize()
  }

  /// `store_path` with a leading `~/` replaced by `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    match (self.store_path.strip_prefix("~"), std::env::var_os("HOME")) {
      (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
      _ => self.store_path.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub accounts: Arc<Vec<Account>>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), accounts: self.accounts.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API routes for `state`, unprefixed.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: RelationStore + 'static,
{
  Router::new()
    .route("/me", get(me::show::<S>))
    .route("/me/relations/{kind}", get(me::relations::<S>))
    .route(
      "/relations/{kind}/{target_id}",
      get(relations::show::<S>)
        .put(relations::create::<S>)
        .delete(relations::remove::<S>),
    )
    .with_state(state)
}

/// The full application: the API under `/api` with request tracing.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RelationStore + 'static,
{
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}
