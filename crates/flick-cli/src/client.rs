//! Async HTTP client for the flick JSON API.
//!
//! [`HttpStore`] is the CLI's remote relationship store and identity
//! provider: it speaks to a running `flick-server` and is handed straight to
//! a [`ToggleController`](flick_core::toggle::ToggleController).

use std::{sync::Arc, time::Duration};

use flick_core::{
  profile::Profile,
  relation::{
    CreateOutcome, DeleteOutcome, Relation, RelationKey, RelationKind,
    RelationSnapshot,
  },
  store::{IdentityProvider, RelationStore},
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Connection settings for the flick API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {path} → {status}")]
  Status {
    method: Method,
    path:   String,
    status: StatusCode,
  },
}

/// The signed-in account as reported by `GET /api/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct Me {
  pub actor_id: Uuid,
  pub profile:  Profile,
}

#[derive(Deserialize)]
struct OutcomeBody<T> {
  outcome: T,
}

/// Async HTTP client for the flick JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based and the
/// resolved identity is shared between clones.
#[derive(Clone)]
pub struct HttpStore {
  client: Client,
  config: ApiConfig,
  me:     Arc<OnceCell<Option<Me>>>,
}

impl HttpStore {
  pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config, me: Arc::new(OnceCell::new()) })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn has_credentials(&self) -> bool { !self.config.username.is_empty() }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let req = self.client.request(method, self.url(path));
    if self.has_credentials() {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    } else {
      req
    }
  }

  async fn send<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    req: RequestBuilder,
  ) -> Result<T, ClientError> {
    let resp = req.send().await?;
    if !resp.status().is_success() {
      return Err(ClientError::Status {
        method,
        path: path.to_owned(),
        status: resp.status(),
      });
    }
    Ok(resp.json().await?)
  }

  async fn call<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
  ) -> Result<T, ClientError> {
    let req = self.request(method.clone(), path);
    self.send(method, path, req).await
  }

  /// `GET /api/me`, resolved once per client. `None` without credentials.
  pub async fn me(&self) -> Result<Option<Me>, ClientError> {
    let me = self
      .me
      .get_or_try_init(|| async {
        if !self.has_credentials() {
          return Ok(None);
        }
        self.call(Method::GET, "/me").await.map(Some)
      })
      .await?;
    Ok(me.clone())
  }
}

fn relation_path(target_id: Uuid, kind: RelationKind) -> String {
  format!("/relations/{kind}/{target_id}")
}

impl RelationStore for HttpStore {
  type Error = ClientError;

  /// `GET /api/relations/{kind}/{target}`. The server answers for the
  /// authenticated account, so `key.actor_id` only has to match it.
  async fn query(&self, key: RelationKey) -> Result<RelationSnapshot, ClientError> {
    self
      .call(Method::GET, &relation_path(key.target_id, key.kind))
      .await
  }

  async fn count(&self, target_id: Uuid, kind: RelationKind) -> Result<u64, ClientError> {
    let path = relation_path(target_id, kind);
    let req = self.client.get(self.url(&path));
    let snapshot: RelationSnapshot = self.send(Method::GET, &path, req).await?;
    Ok(snapshot.aggregate_count)
  }

  async fn create(&self, key: RelationKey) -> Result<CreateOutcome, ClientError> {
    let body: OutcomeBody<CreateOutcome> = self
      .call(Method::PUT, &relation_path(key.target_id, key.kind))
      .await?;
    Ok(body.outcome)
  }

  async fn delete(&self, key: RelationKey) -> Result<DeleteOutcome, ClientError> {
    let body: OutcomeBody<DeleteOutcome> = self
      .call(Method::DELETE, &relation_path(key.target_id, key.kind))
      .await?;
    Ok(body.outcome)
  }

  async fn list(&self, _actor_id: Uuid, kind: RelationKind) -> Result<Vec<Relation>, ClientError> {
    self.call(Method::GET, &format!("/me/relations/{kind}")).await
  }
}

impl IdentityProvider for HttpStore {
  type Error = ClientError;

  async fn current_actor(&self) -> Result<Option<Uuid>, ClientError> {
    Ok(self.me().await?.map(|me| me.actor_id))
  }
}
