//! Identity and session handling.
//!
//! The identity provider is an injected capability; the gate and the login
//! controller only talk to it through [`IdentityProvider`].

mod gate;
mod identity_toolkit;
mod login;

pub use gate::*;
pub use identity_toolkit::IdentityToolkitProvider;
pub use login::*;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::watch;

use crate::errors::ClientResult;

/// Tokens this close to expiry are renewed before use.
pub const REFRESH_SKEW_SECS: i64 = 60;

/// An authenticated session as reported by the identity provider.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
    /// Role claims carried by the ID token
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
    id_token: String,
    refresh_token: String,
}

impl Session {
    pub fn new(
        uid: String,
        email: Option<String>,
        id_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let roles = roles_from_id_token(&id_token);
        Self {
            uid,
            email,
            roles,
            expires_at,
            id_token,
            refresh_token,
        }
    }

    /// Bearer credential for privileged API calls.
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    pub(crate) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(REFRESH_SKEW_SECS) >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("expires_at", &self.expires_at)
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// What subscribers to session changes observe.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Nothing has been resolved yet
    Resolving,
    SignedOut,
    SignedIn(Session),
}

/// Operations the rest of the crate needs from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a session.
    async fn sign_in(&self, email: &str, password: &str) -> ClientResult<Session>;

    /// Ask the provider to email a password reset link.
    async fn send_password_reset(&self, email: &str) -> ClientResult<()>;

    /// Resolve the current session, renewing the token if it is about to expire.
    ///
    /// `Ok(None)` means signed out. Errors mean the state could not be
    /// determined and must not be read as "signed out".
    async fn current_session(&self) -> ClientResult<Option<Session>>;

    /// Change notifications.
    fn subscribe(&self) -> watch::Receiver<SessionState>;

    async fn sign_out(&self);

    /// Fresh bearer token for one privileged call.
    async fn id_token(&self) -> ClientResult<Option<String>> {
        Ok(self
            .current_session()
            .await?
            .map(|session| session.id_token().to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RoleClaims {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

/// Read role claims from an ID token payload.
///
/// The signature is not checked here; the API verifies every token it
/// receives. An unreadable token simply carries no roles.
pub fn roles_from_id_token(token: &str) -> Vec<String> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<RoleClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => {
            let mut roles = data.claims.roles;
            if let Some(role) = data.claims.role {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
            roles
        }
        Err(e) => {
            tracing::debug!("ID token carries no readable role claims: {}", e);
            Vec::new()
        }
    }
}
