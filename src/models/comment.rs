//! Comment model matching the REST API's comment documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, ClientResult};

/// A visitor comment. Unapproved comments only appear in the moderation list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub text: String,
    /// Author label as typed by the visitor
    #[serde(default)]
    pub user_email: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approved: bool,
}

impl Comment {
    /// Whether the moderation view should offer an approve action.
    pub fn can_approve(&self) -> bool {
        !self.approved
    }
}

/// Request body for submitting a comment from the public page.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub text: String,
    pub user_email: String,
}

impl NewComment {
    /// Build a submission, trimming both fields and rejecting blanks.
    pub fn new(author: &str, text: &str) -> ClientResult<Self> {
        let author = author.trim();
        let text = text.trim();

        if author.is_empty() {
            return Err(ClientError::Validation("Please enter your name.".to_string()));
        }
        if text.is_empty() {
            return Err(ClientError::Validation("Please write a comment.".to_string()));
        }

        Ok(Self {
            text: text.to_string(),
            user_email: author.to_string(),
        })
    }
}
