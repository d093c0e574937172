//! Configuration module for the portfolio client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ClientError;

/// Who may pass the session gate in front of the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Any signed-in session
    SignedIn,
    /// A signed-in session whose token carries the named role
    Role(String),
}

impl Default for AccessPolicy {
    fn default() -> Self {
        AccessPolicy::Role("admin".to_string())
    }
}

impl FromStr for AccessPolicy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "signed-in" {
            return Ok(AccessPolicy::SignedIn);
        }
        match s.strip_prefix("role:").map(str::trim) {
            Some(role) if !role.is_empty() => Ok(AccessPolicy::Role(role.to_string())),
            _ => Err(ClientError::Config(format!(
                "Invalid access policy '{}' (expected 'signed-in' or 'role:<name>')",
                s
            ))),
        }
    }
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPolicy::SignedIn => write!(f, "signed-in"),
            AccessPolicy::Role(role) => write!(f, "role:{}", role),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Credentials for the contact form mail relay.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub url: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST API, e.g. `http://localhost:5000/api`
    pub api_base_url: String,
    /// Identity provider web API key
    pub identity_api_key: Option<String>,
    /// Identity Toolkit endpoint root
    pub identity_url: String,
    /// Secure token endpoint root used to renew ID tokens
    pub token_url: String,
    /// Image host upload endpoint
    pub image_host_url: String,
    /// Image host API key
    pub image_host_key: Option<String>,
    pub access_policy: AccessPolicy,
    /// Upper bound for every HTTP request
    pub request_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Contact form relay; `None` disables the contact form
    pub mail: Option<MailConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = var("PORTFOLIO_API_BASE_URL")
            .unwrap_or_else(|| "http://localhost:5000/api".to_string());

        let identity_url = var("PORTFOLIO_IDENTITY_URL")
            .unwrap_or_else(|| "https://identitytoolkit.googleapis.com/v1".to_string());

        let token_url = var("PORTFOLIO_TOKEN_URL")
            .unwrap_or_else(|| "https://securetoken.googleapis.com/v1".to_string());

        let image_host_url = var("PORTFOLIO_IMAGE_HOST_URL")
            .unwrap_or_else(|| "https://api.imgbb.com/1/upload".to_string());

        let access_policy = match var("PORTFOLIO_ACCESS_POLICY") {
            Some(raw) => raw.parse()?,
            None => AccessPolicy::default(),
        };

        let request_timeout = match var("PORTFOLIO_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ClientError::Config(format!("Invalid PORTFOLIO_REQUEST_TIMEOUT_SECS '{}'", raw))
                })?;
                if secs == 0 {
                    return Err(ClientError::Config(
                        "PORTFOLIO_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(30),
        };

        let log_level = var("PORTFOLIO_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match var("PORTFOLIO_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ClientError::Config(format!(
                    "Invalid PORTFOLIO_LOG_FORMAT '{}' (expected 'pretty' or 'json')",
                    other
                )))
            }
        };

        let mail = match (
            var("PORTFOLIO_MAIL_SERVICE_ID"),
            var("PORTFOLIO_MAIL_TEMPLATE_ID"),
            var("PORTFOLIO_MAIL_PUBLIC_KEY"),
        ) {
            (Some(service_id), Some(template_id), Some(public_key)) => Some(MailConfig {
                url: var("PORTFOLIO_MAIL_URL").unwrap_or_else(|| {
                    "https://api.emailjs.com/api/v1.0/email/send".to_string()
                }),
                service_id,
                template_id,
                public_key,
            }),
            _ => None,
        };

        Ok(Self {
            api_base_url,
            identity_api_key: var("PORTFOLIO_IDENTITY_API_KEY"),
            identity_url,
            token_url,
            image_host_url,
            image_host_key: var("PORTFOLIO_IMAGE_HOST_KEY"),
            access_policy,
            request_timeout,
            log_level,
            log_format,
            mail,
        })
    }
}
