//! Portfolio Client
//!
//! Client core for a portfolio site and its admin panel: a typed REST
//! gateway, an identity-backed session gate, image uploads to a third-party
//! host, and generic CRUD workflow controllers the views render from.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod upload;
pub mod workflow;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::{ContactMailer, ResourceGateway, RestClient};
use auth::{IdentityProvider, IdentityToolkitProvider, LoginController, SessionGate};
use config::{Config, LogFormat};
use errors::{ClientError, ClientResult};
use models::{Comment, Project};
use upload::{ImageHost, ImageHostClient};
use workflow::{CommentBoard, CommentModeration, CrudController, ProjectAdmin, ProjectShowcase};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this more than once is
/// harmless.
pub fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let (pretty, json) = match config.log_format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json)
        .try_init();

    if installed.is_ok() {
        tracing::info!("Portfolio client logging at {}", config.log_level);
    }
}

/// Composition root: owns the shared HTTP client and the injected services.
#[derive(Clone)]
pub struct Portfolio {
    config: Arc<Config>,
    http: reqwest::Client,
    identity: Arc<dyn IdentityProvider>,
    images: Arc<dyn ImageHost>,
    rest: RestClient,
}

impl Portfolio {
    /// Wire up the hosted identity provider and image host from configuration.
    pub fn from_config(config: Config) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let identity = Arc::new(IdentityToolkitProvider::new(
            http.clone(),
            config.identity_api_key.clone(),
            &config.identity_url,
            &config.token_url,
        ));
        let images = Arc::new(ImageHostClient::new(
            http.clone(),
            &config.image_host_url,
            config.image_host_key.clone(),
        ));

        if config.identity_api_key.is_none() {
            tracing::warn!(
                "No identity API key configured (PORTFOLIO_IDENTITY_API_KEY). Admin login is disabled!"
            );
        }

        Self::with_services(config, http, identity, images)
    }

    /// Build around caller-supplied identity and image services.
    pub fn with_services(
        config: Config,
        http: reqwest::Client,
        identity: Arc<dyn IdentityProvider>,
        images: Arc<dyn ImageHost>,
    ) -> ClientResult<Self> {
        let rest = RestClient::new(http.clone(), &config.api_base_url, Arc::clone(&identity))?;
        tracing::info!(
            "Portfolio client using API at {} (access policy {})",
            config.api_base_url,
            config.access_policy
        );

        Ok(Self {
            config: Arc::new(config),
            http,
            identity,
            images,
            rest,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.identity)
    }

    pub fn gate(&self) -> SessionGate {
        SessionGate::new(self.identity(), self.config.access_policy.clone())
    }

    pub fn login(&self) -> LoginController {
        LoginController::new(self.identity())
    }

    pub fn comments(&self) -> ResourceGateway<Comment> {
        self.rest.resource()
    }

    pub fn projects(&self) -> ResourceGateway<Project> {
        self.rest.resource()
    }

    pub fn comment_board(&self) -> CrudController<CommentBoard> {
        CrudController::new(CommentBoard::new(self.comments()))
    }

    pub fn comment_moderation(&self) -> CrudController<CommentModeration> {
        CrudController::new(CommentModeration::new(self.comments()))
    }

    pub fn project_showcase(&self) -> CrudController<ProjectShowcase> {
        CrudController::new(ProjectShowcase::new(self.projects()))
    }

    pub fn project_admin(&self) -> CrudController<ProjectAdmin> {
        CrudController::new(ProjectAdmin::new(
            self.projects(),
            Arc::clone(&self.images),
        ))
    }

    /// Contact form sender, if a mail relay is configured.
    pub fn contact(&self) -> Option<ContactMailer> {
        self.config
            .mail
            .clone()
            .map(|mail| ContactMailer::new(self.http.clone(), mail))
    }
}
