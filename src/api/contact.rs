//! Contact form relay.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use super::ensure_success;
use crate::config::MailConfig;
use crate::errors::{ClientError, ClientResult};

pub const MESSAGE_SENT: &str = "Message sent successfully!";
pub const MESSAGE_FAILED: &str = "Failed to send message. Please try again.";

/// Contact form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactMessage {
    pub fn validate(&self) -> ClientResult<()> {
        if self.name.trim().is_empty()
            || self.email.trim().is_empty()
            || self.message.trim().is_empty()
        {
            return Err(ClientError::Validation(
                "Please fill in your name, email and message.".to_string(),
            ));
        }
        let email = self.email.trim();
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(ClientError::Validation(
                "Please enter a valid email address.".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct TemplateParams<'a> {
    from_name: &'a str,
    from_email: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

/// Feedback for the contact form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactState {
    pub submitting: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Sends contact form messages through the mail relay service.
pub struct ContactMailer {
    http: reqwest::Client,
    mail: MailConfig,
    state: Mutex<ContactState>,
}

impl ContactMailer {
    pub fn new(http: reqwest::Client, mail: MailConfig) -> Self {
        Self {
            http,
            mail,
            state: Mutex::new(ContactState::default()),
        }
    }

    pub fn state(&self) -> ContactState {
        self.state.lock().clone()
    }

    pub async fn send(&self, message: &ContactMessage) -> ClientResult<()> {
        {
            let mut state = self.state.lock();
            if state.submitting {
                return Err(ClientError::Busy);
            }
            state.error = None;
            state.notice = None;
            if let Err(err) = message.validate() {
                state.error = Some(err.user_message());
                return Err(err);
            }
            state.submitting = true;
        }

        let result = self.relay(message).await;

        let mut state = self.state.lock();
        state.submitting = false;
        match result {
            Ok(()) => {
                info!("Contact message relayed");
                state.notice = Some(MESSAGE_SENT.to_string());
                Ok(())
            }
            Err(err) => {
                warn!("Contact message failed: {}", err);
                state.error = Some(MESSAGE_FAILED.to_string());
                Err(err)
            }
        }
    }

    async fn relay(&self, message: &ContactMessage) -> ClientResult<()> {
        let body = RelayRequest {
            service_id: &self.mail.service_id,
            template_id: &self.mail.template_id,
            user_id: &self.mail.public_key,
            template_params: TemplateParams {
                from_name: message.name.trim(),
                from_email: message.email.trim(),
                message: message.message.trim(),
            },
        };

        let response = self.http.post(&self.mail.url).json(&body).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}
