//! Comment endpoints.

use reqwest::Method;
use tracing::info;

use super::{ensure_success, Resource, ResourceGateway};
use crate::errors::ClientResult;
use crate::models::{Comment, NewComment};

impl Resource for Comment {
    const COLLECTION: &'static str = "comments";
    const PUBLIC_CREATE: bool = true;

    fn id(&self) -> &str {
        &self.id
    }
}

impl ResourceGateway<Comment> {
    /// Submit a visitor comment. It stays hidden until approved.
    pub async fn submit(&self, comment: &NewComment) -> ClientResult<Comment> {
        self.create(comment).await
    }

    /// Mark a comment approved (`PUT /comments/approve/{id}`).
    pub async fn approve(&self, id: &str) -> ClientResult<()> {
        let request = self
            .client
            .request(Method::PUT, &[Comment::COLLECTION, "approve", id], true)
            .await?;
        ensure_success(request.send().await?).await?;
        info!("Approved comment {}", id);
        Ok(())
    }
}
