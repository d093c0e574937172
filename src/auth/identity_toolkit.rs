//! Identity provider backed by the Identity Toolkit REST API.
//!
//! Sign-in and password reset go to `accounts:*` endpoints; expired ID tokens
//! are renewed through the secure token endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{IdentityProvider, Session, SessionState};
use crate::errors::{extract_message, ClientError, ClientResult};

/// Used when the provider sends an unparseable lifetime.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Session holder talking to the hosted identity service.
pub struct IdentityToolkitProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    identity_url: String,
    token_url: String,
    session: RwLock<Option<Session>>,
    changes: watch::Sender<SessionState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
    user_id: String,
}

impl IdentityToolkitProvider {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        identity_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        let (changes, _) = watch::channel(SessionState::Resolving);
        Self {
            http,
            api_key,
            identity_url: identity_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into().trim_end_matches('/').to_string(),
            session: RwLock::new(None),
            changes,
        }
    }

    fn api_key(&self) -> ClientResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            ClientError::Config("PORTFOLIO_IDENTITY_API_KEY is not set".to_string())
        })
    }

    fn publish(&self, next: SessionState) {
        self.changes.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }

    fn store(&self, session: Option<Session>) {
        *self.session.write() = session.clone();
        self.publish(match session {
            Some(session) => SessionState::SignedIn(session),
            None => SessionState::SignedOut,
        });
    }

    /// Map a failed provider response: 4xx is a rejection, anything else a server fault.
    async fn rejection(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body);

        if status.is_client_error() {
            ClientError::Auth(message.unwrap_or_else(|| status.to_string()))
        } else {
            ClientError::Server {
                status: status.as_u16(),
                message,
            }
        }
    }

    async fn refresh(&self, session: &Session) -> ClientResult<Session> {
        let api_key = self.api_key()?;
        let url = format!("{}/token", self.token_url);
        debug!("Renewing ID token for {}", session.uid);

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: RefreshResponse = response.json().await?;
        Ok(Session::new(
            body.user_id,
            session.email.clone(),
            body.id_token,
            body.refresh_token,
            expiry_from(body.expires_in.as_deref()),
        ))
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitProvider {
    async fn sign_in(&self, email: &str, password: &str) -> ClientResult<Session> {
        let api_key = self.api_key()?;
        let url = format!("{}/accounts:signInWithPassword", self.identity_url);

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::rejection(response).await;
            warn!("Sign-in failed: {}", err);
            return Err(err);
        }

        let body: SignInResponse = response.json().await?;
        let session = Session::new(
            body.local_id,
            body.email,
            body.id_token,
            body.refresh_token,
            expiry_from(body.expires_in.as_deref()),
        );

        info!("Signed in as {} (roles: {:?})", session.uid, session.roles);
        self.store(Some(session.clone()));
        Ok(session)
    }

    async fn send_password_reset(&self, email: &str) -> ClientResult<()> {
        let api_key = self.api_key()?;
        let url = format!("{}/accounts:sendOobCode", self.identity_url);

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&json!({
                "requestType": "PASSWORD_RESET",
                "email": email,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::rejection(response).await;
            warn!("Password reset request failed: {}", err);
            return Err(err);
        }

        info!("Password reset email requested");
        Ok(())
    }

    async fn current_session(&self) -> ClientResult<Option<Session>> {
        let current = self.session.read().clone();

        let Some(session) = current else {
            self.publish(SessionState::SignedOut);
            return Ok(None);
        };

        if !session.needs_refresh(Utc::now()) {
            self.publish(SessionState::SignedIn(session.clone()));
            return Ok(Some(session));
        }

        match self.refresh(&session).await {
            Ok(renewed) => {
                let mut slot = self.session.write();
                // A sign-out or a newer sign-in during the refresh wins.
                let still_current = slot
                    .as_ref()
                    .is_some_and(|s| s.refresh_token() == session.refresh_token());
                if !still_current {
                    return Ok(slot.clone());
                }
                *slot = Some(renewed.clone());
                drop(slot);

                info!("Renewed ID token for {}", renewed.uid);
                self.publish(SessionState::SignedIn(renewed.clone()));
                Ok(Some(renewed))
            }
            Err(ClientError::Auth(reason)) => {
                warn!("Session for {} ended: {}", session.uid, reason);
                self.store(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) {
        let previous = self.session.write().take();
        if let Some(session) = previous {
            info!("Signed out {}", session.uid);
        }
        self.publish(SessionState::SignedOut);
    }
}

fn expiry_from(expires_in: Option<&str>) -> DateTime<Utc> {
    let secs = expires_in
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Utc::now() + chrono::Duration::seconds(secs)
}
