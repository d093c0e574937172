//! Error handling module for the portfolio client.
//!
//! Provides one error type for every layer (gateway, identity, uploads,
//! workflows) with stable codes and user-facing messages.

use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const AUTH_ERROR: &str = "AUTH_ERROR";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UPLOAD_ERROR: &str = "UPLOAD_ERROR";
    pub const BUSY: &str = "BUSY";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
}

/// Shown when the server gave no usable message.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Client error type.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Local, field-level failure; never reaches the network
    #[error("{0}")]
    Validation(String),
    /// Sign-in, password reset or session failure
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The request could not complete (connect, timeout, TLS)
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response
    #[error("server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },
    /// The addressed entity does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// The image host rejected a file or could not be reached
    #[error("image {position} ({file_name}) failed to upload: {message}")]
    Upload {
        /// 1-based position of the file in its batch
        position: usize,
        file_name: String,
        message: String,
    },
    /// A submission is already running on this controller
    #[error("another operation is still in progress")]
    Busy,
    /// Missing or malformed configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Validation(_) => codes::VALIDATION_ERROR,
            ClientError::Auth(_) => codes::AUTH_ERROR,
            ClientError::Network(_) => codes::NETWORK_ERROR,
            ClientError::Server { .. } => codes::SERVER_ERROR,
            ClientError::NotFound(_) => codes::NOT_FOUND,
            ClientError::Upload { .. } => codes::UPLOAD_ERROR,
            ClientError::Busy => codes::BUSY,
            ClientError::Config(_) => codes::CONFIG_ERROR,
        }
    }

    /// Message suitable for showing next to a form or list.
    ///
    /// Prefers whatever the server or provider said; falls back to a
    /// generic text when it said nothing useful.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(msg) | ClientError::Auth(msg) => msg.clone(),
            ClientError::NotFound(msg) => msg.clone(),
            ClientError::Server {
                message: Some(msg), ..
            } if !msg.trim().is_empty() => msg.clone(),
            ClientError::Server { .. } => GENERIC_FAILURE.to_string(),
            ClientError::Network(_) => {
                "Could not reach the server. Please check your connection and try again."
                    .to_string()
            }
            ClientError::Upload { .. } => self.to_string(),
            ClientError::Busy => "Please wait for the current operation to finish.".to_string(),
            ClientError::Config(_) => GENERIC_FAILURE.to_string(),
        }
    }

    /// Whether the failure happened before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_) | ClientError::Busy | ClientError::Config(_)
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP error: {:?}", err);
        if err.is_timeout() {
            ClientError::Network("request timed out".to_string())
        } else if err.is_decode() {
            ClientError::Server {
                status: err.status().map(|s| s.as_u16()).unwrap_or(200),
                message: Some(format!("Unexpected response body: {}", err)),
            }
        } else if let Some(status) = err.status() {
            ClientError::Server {
                status: status.as_u16(),
                message: None,
            }
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        ClientError::Server {
            status: 200,
            message: Some(format!("Unexpected response body: {}", err)),
        }
    }
}

/// Result alias used across the crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Pull a human-readable message out of an error response body.
///
/// Understands `{"message": ..}`, `{"error": ".."}` and
/// `{"error": {"message": ..}}`; anything else yields `None`.
pub fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    let message = value
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| value.get("error").and_then(|e| e.as_str()))
        .or_else(|| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
        })?;

    let message = message.trim();
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}
