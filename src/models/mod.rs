//! Data models for the portfolio REST API.
//!
//! These match the documents the API returns (`_id` keys, camelCase fields).

mod comment;
mod project;

pub use comment::*;
pub use project::*;
