//! Comment views: the public board and the moderation list.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{CrudController, Deletable, Editable, Listing};
use crate::api::{DeleteOutcome, ResourceGateway};
use crate::errors::{ClientError, ClientResult};
use crate::models::{Comment, NewComment};

pub const COMMENT_SUBMITTED: &str = "Comment submitted! Waiting for admin approval.";

/// Form contents on the public comments page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentDraft {
    pub author: String,
    pub text: String,
}

/// Public page: approved comments plus a submission form.
pub struct CommentBoard {
    gateway: ResourceGateway<Comment>,
}

impl CommentBoard {
    pub fn new(gateway: ResourceGateway<Comment>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Listing for CommentBoard {
    type Item = Comment;
    type Draft = CommentDraft;
    const NAME: &'static str = "comment";

    fn item_id(item: &Comment) -> &str {
        &item.id
    }

    async fn list(&self) -> ClientResult<Vec<Comment>> {
        self.gateway.list().await
    }
}

#[async_trait]
impl Editable for CommentBoard {
    fn validate(&self, draft: &CommentDraft) -> ClientResult<()> {
        NewComment::new(&draft.author, &draft.text).map(|_| ())
    }

    async fn create(&self, draft: CommentDraft) -> ClientResult<()> {
        let comment = NewComment::new(&draft.author, &draft.text)?;
        self.gateway.submit(&comment).await?;
        Ok(())
    }

    fn success_notice(&self, _mode: &super::FormMode) -> Option<String> {
        Some(COMMENT_SUBMITTED.to_string())
    }
}

/// Admin moderation list, including unapproved comments.
pub struct CommentModeration {
    gateway: ResourceGateway<Comment>,
}

impl CommentModeration {
    pub fn new(gateway: ResourceGateway<Comment>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Listing for CommentModeration {
    type Item = Comment;
    type Draft = ();
    const NAME: &'static str = "moderated comment";

    fn item_id(item: &Comment) -> &str {
        &item.id
    }

    async fn list(&self) -> ClientResult<Vec<Comment>> {
        self.gateway.list_all().await
    }
}

#[async_trait]
impl Deletable for CommentModeration {
    async fn delete(&self, id: &str) -> ClientResult<DeleteOutcome> {
        self.gateway.delete(id).await
    }
}

impl CrudController<CommentModeration> {
    /// Approve a comment: flip it locally at once, then re-read the list.
    ///
    /// If the server refuses, the local flag is reverted.
    pub async fn approve(&self, id: &str) -> ClientResult<()> {
        {
            let mut state = self.state.lock();
            if state.is_busy() {
                return Err(ClientError::Busy);
            }
            let comment = state
                .items
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| ClientError::NotFound(format!("No comment {}", id)))?;
            if comment.approved {
                return Ok(());
            }
            comment.approved = true;
            self.enter_submitting(&mut state);
        }

        let result = self.workflow.gateway.approve(id).await;
        if !self.is_mounted() {
            self.release();
            return result;
        }

        match result {
            Ok(()) => {
                info!("Comment {} approved", id);
                self.reconcile().await;
                Ok(())
            }
            Err(err) => {
                warn!("Approving comment {} failed: {}", id, err);
                if let Some(comment) = self.state.lock().items.iter_mut().find(|c| c.id == id) {
                    comment.approved = false;
                }
                Err(self.fail(err))
            }
        }
    }
}
