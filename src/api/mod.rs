//! REST API gateway.
//!
//! One typed gateway per resource kind, all sharing a [`RestClient`] that
//! knows the API base URL and where to get bearer tokens from.

mod comments;
mod contact;
mod projects;

pub use contact::*;

use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::IdentityProvider;
use crate::errors::{extract_message, ClientError, ClientResult};

/// A resource kind exposed under its own collection endpoint.
pub trait Resource: DeserializeOwned + Send + Sync + 'static {
    /// Collection path segment, e.g. `comments`
    const COLLECTION: &'static str;

    /// Whether visitors may create entries without signing in.
    const PUBLIC_CREATE: bool = false;

    fn id(&self) -> &str;
}

/// Result of a DELETE call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The entity was already gone
    NotFound,
}

/// Shared HTTP plumbing for every gateway.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    identity: Arc<dyn IdentityProvider>,
}

impl RestClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        identity: Arc<dyn IdentityProvider>,
    ) -> ClientResult<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            ClientError::Config(format!("Invalid API base URL '{}': {}", base_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "API base URL '{}' cannot carry paths",
                base_url
            )));
        }
        Ok(Self {
            http,
            base,
            identity,
        })
    }

    /// Gateway for one resource kind.
    pub fn resource<R: Resource>(&self) -> ResourceGateway<R> {
        ResourceGateway {
            client: self.clone(),
            _resource: PhantomData,
        }
    }

    /// Base URL joined with percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("API base URL cannot carry paths".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fresh ID token for one privileged call.
    async fn bearer(&self) -> ClientResult<String> {
        match self.identity.id_token().await? {
            Some(token) => Ok(token),
            None => Err(ClientError::Auth("Admin login required".to_string())),
        }
    }

    /// Build a request, attaching a bearer token when `authenticated`.
    pub(crate) async fn request(
        &self,
        method: Method,
        segments: &[&str],
        authenticated: bool,
    ) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, url);
        if authenticated {
            builder = builder.bearer_auth(self.bearer().await?);
        }
        Ok(builder)
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> ClientResult<T> {
        let response = ensure_success(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx response into a typed failure carrying the server's message.
pub async fn ensure_success(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body);
    warn!("API request failed with {}: {:?}", status, message);

    if status == StatusCode::NOT_FOUND {
        Err(ClientError::NotFound(
            message.unwrap_or_else(|| "The requested item no longer exists.".to_string()),
        ))
    } else {
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

/// Typed gateway for one resource kind.
pub struct ResourceGateway<R> {
    client: RestClient,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceGateway<R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> ResourceGateway<R> {
    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Public listing (`GET /{r}`).
    pub async fn list(&self) -> ClientResult<Vec<R>> {
        let request = self
            .client
            .request(Method::GET, &[R::COLLECTION], false)
            .await?;
        self.client.send_json(request).await
    }

    /// Full listing for administrators (`GET /{r}/all`).
    pub async fn list_all(&self) -> ClientResult<Vec<R>> {
        let request = self
            .client
            .request(Method::GET, &[R::COLLECTION, "all"], true)
            .await?;
        self.client.send_json(request).await
    }

    pub async fn create<B>(&self, fields: &B) -> ClientResult<R>
    where
        B: Serialize + Sync + ?Sized,
    {
        let request = self
            .client
            .request(Method::POST, &[R::COLLECTION], !R::PUBLIC_CREATE)
            .await?
            .json(fields);
        let created: R = self.client.send_json(request).await?;
        info!("Created {} {}", R::COLLECTION, created.id());
        Ok(created)
    }

    /// Full replacement of an entity (`PUT /{r}/{id}`).
    pub async fn update<B>(&self, id: &str, fields: &B) -> ClientResult<R>
    where
        B: Serialize + Sync + ?Sized,
    {
        let request = self
            .client
            .request(Method::PUT, &[R::COLLECTION, id], true)
            .await?
            .json(fields);
        let updated = self.client.send_json(request).await?;
        info!("Updated {} {}", R::COLLECTION, id);
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> ClientResult<DeleteOutcome> {
        let request = self
            .client
            .request(Method::DELETE, &[R::COLLECTION, id], true)
            .await?;

        match ensure_success(request.send().await?).await {
            Ok(_) => {
                info!("Deleted {} {}", R::COLLECTION, id);
                Ok(DeleteOutcome::Deleted)
            }
            Err(ClientError::NotFound(_)) => {
                warn!("{} {} was already gone", R::COLLECTION, id);
                Ok(DeleteOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}
