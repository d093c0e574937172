//! Project model matching the REST API's project documents.

use serde::{Deserialize, Serialize};

/// Hard cap on images attached to one project.
pub const MAX_PROJECT_IMAGES: usize = 4;

/// A portfolio project entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Full field set sent on create and on update (PUT replaces everything).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFields {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub technologies: Vec<String>,
    pub images: Vec<String>,
}

/// Split comma-separated input into trimmed, non-empty entries.
pub fn parse_technologies(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tech| !tech.is_empty())
        .map(str::to_string)
        .collect()
}

/// Existing images first, then new uploads, truncated to the cap.
pub fn merge_images(existing: &[String], uploaded: &[String]) -> Vec<String> {
    existing
        .iter()
        .chain(uploaded)
        .take(MAX_PROJECT_IMAGES)
        .cloned()
        .collect()
}

/// Blank optional inputs are sent as absent rather than as empty strings.
pub fn optional_field(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
