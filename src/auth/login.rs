//! Admin login form: sign-in and password reset.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::IdentityProvider;
use crate::errors::{ClientError, ClientResult};
use crate::routes::{is_internal_path, HOME_PATH, LOGIN_PATH};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const RESET_EMAIL_REQUIRED: &str = "Please enter your email to reset password.";
pub const RESET_EMAIL_SENT: &str = "Password reset email sent. Check your inbox.";
pub const RESET_EMAIL_FAILED: &str = "Failed to send reset email. Please try again.";

/// Snapshot of the login form's feedback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginState {
    pub submitting: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

pub struct LoginController {
    identity: Arc<dyn IdentityProvider>,
    state: Mutex<LoginState>,
}

impl LoginController {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            state: Mutex::new(LoginState::default()),
        }
    }

    pub fn state(&self) -> LoginState {
        self.state.lock().clone()
    }

    /// Sign in and return the location to navigate to.
    ///
    /// `return_to` is the location the session gate preserved; external or
    /// missing locations fall back to the home page.
    pub async fn submit(
        &self,
        email: &str,
        password: &str,
        return_to: Option<&str>,
    ) -> ClientResult<String> {
        let email = email.trim();
        {
            let mut state = self.state.lock();
            if state.submitting {
                return Err(ClientError::Busy);
            }
            state.error = None;
            state.notice = None;
            if email.is_empty() || password.is_empty() {
                let err =
                    ClientError::Validation("Please enter your email and password.".to_string());
                state.error = Some(err.user_message());
                return Err(err);
            }
            state.submitting = true;
        }

        let result = self.identity.sign_in(email, password).await;

        let mut state = self.state.lock();
        state.submitting = false;
        match result {
            Ok(session) => {
                let target = return_target(return_to);
                info!("Login succeeded for {}; continuing to {}", session.uid, target);
                Ok(target)
            }
            Err(err) => {
                state.error = Some(match &err {
                    ClientError::Auth(_) => INVALID_CREDENTIALS.to_string(),
                    other => other.user_message(),
                });
                Err(err)
            }
        }
    }

    pub async fn forgot_password(&self, email: &str) -> ClientResult<()> {
        let email = email.trim();
        {
            let mut state = self.state.lock();
            state.error = None;
            state.notice = None;
            if email.is_empty() {
                state.error = Some(RESET_EMAIL_REQUIRED.to_string());
                return Err(ClientError::Validation(RESET_EMAIL_REQUIRED.to_string()));
            }
        }

        let result = self.identity.send_password_reset(email).await;

        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                state.notice = Some(RESET_EMAIL_SENT.to_string());
                Ok(())
            }
            Err(err) => {
                warn!("Password reset failed: {}", err);
                state.error = Some(RESET_EMAIL_FAILED.to_string());
                Err(err)
            }
        }
    }
}

/// Post-login destination for a preserved location.
pub fn return_target(return_to: Option<&str>) -> String {
    match return_to {
        Some(location) if is_internal_path(location) && !location.starts_with(LOGIN_PATH) => {
            location.to_string()
        }
        _ => HOME_PATH.to_string(),
    }
}
