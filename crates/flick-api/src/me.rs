//! Handlers for `/me` endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use flick_core::{
  profile::{Profile, ProfileRow},
  relation::{Relation, RelationKind},
  store::RelationStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Actor, error::ApiError, relations::parse_kind};

/// Body of `GET /me`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeBody {
  pub actor_id: Uuid,
  pub profile:  Profile,
}

/// `GET /me`: the signed-in actor and their channel profile.
pub async fn show<S>(
  State(state): State<AppState<S>>,
  actor: Actor,
) -> Result<Json<MeBody>, ApiError>
where
  S: RelationStore + 'static,
{
  let subscribers = state
    .store
    .count(actor.actor_id, RelationKind::Subscribe)
    .await
    .map_err(ApiError::store)?;

  let row = ProfileRow {
    id:               actor.actor_id,
    username:         Some(actor.username),
    avatar:           None,
    subscriber_count: Some(i64::try_from(subscribers).unwrap_or(i64::MAX)),
  };
  Ok(Json(MeBody {
    actor_id: actor.actor_id,
    profile:  Profile::from_row(actor.actor_id, Some(row)),
  }))
}

/// `GET /me/relations/{kind}`, e.g. saved videos, subscriptions.
pub async fn relations<S>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(kind): Path<String>,
) -> Result<Json<Vec<Relation>>, ApiError>
where
  S: RelationStore + 'static,
{
  let kind = parse_kind(&kind)?;
  let relations = state
    .store
    .list(actor.actor_id, kind)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(relations))
}
