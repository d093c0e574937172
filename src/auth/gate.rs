//! Session gate in front of protected dashboard routes.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{IdentityProvider, Session, SessionState};
use crate::config::AccessPolicy;
use crate::routes::{Route, LOGIN_PATH};

/// Redirect to the login page, remembering where the visitor was going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    pub from: String,
}

/// What the view layer should show for a requested location.
#[derive(Debug, Clone, PartialEq)]
pub enum GateView {
    /// Session resolution is pending
    Loading,
    /// Public page; no session needed
    Open,
    /// Access granted
    Render(Session),
    Redirect(Redirect),
    /// The session could not be resolved; not the same as signed out
    Error(String),
}

/// Guards protected views according to the configured policy.
#[derive(Clone)]
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    policy: AccessPolicy,
}

impl SessionGate {
    pub fn new(identity: Arc<dyn IdentityProvider>, policy: AccessPolicy) -> Self {
        Self { identity, policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// View for any location, consulting the identity provider only for protected routes.
    pub async fn enter(&self, location: &str) -> GateView {
        match Route::parse(location) {
            Some(route) if route.requires_session() => self.resolve(location).await,
            _ => GateView::Open,
        }
    }

    /// Resolve the session and decide for a protected location.
    pub async fn resolve(&self, requested: &str) -> GateView {
        match self.identity.current_session().await {
            Ok(session) => self.decide(session.as_ref(), requested),
            Err(err) => {
                warn!("Could not resolve session for {}: {}", requested, err);
                GateView::Error(err.user_message())
            }
        }
    }

    /// Re-evaluate after a session change notification.
    pub fn observe(&self, state: &SessionState, requested: &str) -> GateView {
        match state {
            SessionState::Resolving => GateView::Loading,
            SessionState::SignedOut => self.decide(None, requested),
            SessionState::SignedIn(session) => self.decide(Some(session), requested),
        }
    }

    pub fn decide(&self, session: Option<&Session>, requested: &str) -> GateView {
        let allowed = match (session, &self.policy) {
            (None, _) => false,
            (Some(_), AccessPolicy::SignedIn) => true,
            (Some(session), AccessPolicy::Role(role)) => session.has_role(role),
        };

        match session {
            Some(session) if allowed => GateView::Render(session.clone()),
            _ => {
                debug!("Gate redirecting {} to login (policy {})", requested, self.policy);
                GateView::Redirect(Redirect {
                    to: LOGIN_PATH.to_string(),
                    from: requested.to_string(),
                })
            }
        }
    }
}
