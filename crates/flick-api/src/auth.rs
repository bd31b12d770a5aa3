//! HTTP Basic-auth extractors resolving the acting identity.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use flick_core::store::RelationStore;
use rand_core::OsRng;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// A login accepted by this server instance.
#[derive(Clone, Deserialize)]
pub struct Account {
  pub username:      String,
  /// The identity recorded on relationship facts made by this account.
  pub actor_id:      Uuid,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Hash `password` into the PHC string stored as an account's
/// `password_hash`, with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Resolve the caller from the `Authorization` header.
///
/// No header means an anonymous caller (`Ok(None)`); a header that does not
/// match an account is rejected.
pub fn resolve_actor<'a>(
  headers: &HeaderMap,
  accounts: &'a [Account],
) -> Result<Option<&'a Account>, ApiError> {
  let Some(header_val) = headers.get(header::AUTHORIZATION) else {
    return Ok(None);
  };
  let header_val = header_val.to_str().map_err(|_| ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let account = accounts
    .iter()
    .find(|a| a.username == username)
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(Some(account))
}

/// A signed-in caller. Rejects anonymous requests with 401.
pub struct Actor {
  pub actor_id: Uuid,
  pub username: String,
}

/// A caller that may be anonymous.
pub struct MaybeActor(pub Option<Uuid>);

impl<S> FromRequestParts<AppState<S>> for Actor
where
  S: RelationStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let account = resolve_actor(&parts.headers, &state.accounts)?
      .ok_or(ApiError::Unauthorized)?;
    Ok(Actor {
      actor_id: account.actor_id,
      username: account.username.clone(),
    })
  }
}

impl<S> FromRequestParts<AppState<S>> for MaybeActor
where
  S: RelationStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let account = resolve_actor(&parts.headers, &state.accounts)?;
    Ok(MaybeActor(account.map(|a| a.actor_id)))
  }
}
