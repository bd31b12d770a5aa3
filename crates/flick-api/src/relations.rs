//! Handlers for `/relations/{kind}/{target_id}`.
//!
//! `PUT` and `DELETE` are idempotent: repeating either reports the existing
//! end state (`already_exists`, `not_found`) instead of failing.

use std::str::FromStr as _;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use flick_core::{
  relation::{CreateOutcome, DeleteOutcome, RelationKey, RelationKind, RelationSnapshot},
  store::RelationStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Actor, MaybeActor},
  error::ApiError,
};

#[derive(Debug, Serialize)]
pub struct OutcomeBody<T> {
  pub outcome: T,
}

pub(crate) fn parse_kind(raw: &str) -> Result<RelationKind, ApiError> {
  RelationKind::from_str(raw)
    .map_err(|_| ApiError::BadRequest(format!("unknown relation kind: {raw:?}")))
}

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /relations/{kind}/{target_id}`
///
/// Anonymous callers get `exists: false` together with the real count.
pub async fn show<S>(
  State(state): State<AppState<S>>,
  MaybeActor(actor): MaybeActor,
  Path((kind, target_id)): Path<(String, Uuid)>,
) -> Result<Json<RelationSnapshot>, ApiError>
where
  S: RelationStore + 'static,
{
  let kind = parse_kind(&kind)?;
  let snapshot = match actor {
    Some(actor_id) => state
      .store
      .query(RelationKey::new(actor_id, target_id, kind))
      .await
      .map_err(ApiError::store)?,
    None => RelationSnapshot {
      exists:          false,
      aggregate_count: state
        .store
        .count(target_id, kind)
        .await
        .map_err(ApiError::store)?,
    },
  };
  Ok(Json(snapshot))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `PUT /relations/{kind}/{target_id}`: 201 when created, 200 when the fact
/// already existed.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path((kind, target_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RelationStore + 'static,
{
  let key = RelationKey::new(actor.actor_id, target_id, parse_kind(&kind)?);
  let outcome = state.store.create(key).await.map_err(ApiError::store)?;
  let status = match outcome {
    CreateOutcome::Created => StatusCode::CREATED,
    CreateOutcome::AlreadyExists => StatusCode::OK,
  };
  tracing::debug!(?key, ?outcome, "create relation");
  Ok((status, Json(OutcomeBody { outcome })))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /relations/{kind}/{target_id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path((kind, target_id)): Path<(String, Uuid)>,
) -> Result<Json<OutcomeBody<DeleteOutcome>>, ApiError>
where
  S: RelationStore + 'static,
{
  let key = RelationKey::new(actor.actor_id, target_id, parse_kind(&kind)?);
  let outcome = state.store.delete(key).await.map_err(ApiError::store)?;
  tracing::debug!(?key, ?outcome, "delete relation");
  Ok(Json(OutcomeBody { outcome }))
}
