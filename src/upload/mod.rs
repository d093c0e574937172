//! Image upload side-channel.
//!
//! Project images are pushed to a third-party image host one file at a time;
//! only the returned URLs are sent to the REST API.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::{extract_message, ClientError, ClientResult};

pub const INVALID_IMAGE: &str = "Please select a valid image file.";

/// A file picked by the user, held in memory until upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    /// MIME type reported for the file, e.g. `image/png`
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }

    /// Multipart part carrying this file under its own name and type.
    pub(crate) fn part(&self) -> ClientResult<Part> {
        Ok(Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)?)
    }
}

/// Anything that turns an image into a durable URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, file: &ImageFile) -> ClientResult<String>;
}

#[derive(Debug, Default, Deserialize)]
struct HostResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<HostData>,
}

#[derive(Debug, Deserialize)]
struct HostData {
    url: String,
}

/// REST client for the image host (`POST {url}?key=`, multipart field `image`).
pub struct ImageHostClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl ImageHostClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key,
        }
    }

    fn rejected(file: &ImageFile, message: String) -> ClientError {
        ClientError::Upload {
            position: 1,
            file_name: file.file_name.clone(),
            message,
        }
    }
}

#[async_trait]
impl ImageHost for ImageHostClient {
    async fn upload(&self, file: &ImageFile) -> ClientResult<String> {
        if !file.is_image() {
            return Err(ClientError::Validation(INVALID_IMAGE.to_string()));
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ClientError::Config("PORTFOLIO_IMAGE_HOST_KEY is not set".to_string())
        })?;

        debug!("Uploading {} ({} bytes)", file.file_name, file.bytes.len());
        let form = Form::new().part("image", file.part()?);
        let response = self
            .http
            .post(&self.url)
            .query(&[("key", api_key)])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: HostResponse = serde_json::from_str(&body).unwrap_or_default();

        match parsed.data {
            Some(data) if status.is_success() && parsed.success => {
                info!("Uploaded {} to {}", file.file_name, data.url);
                Ok(data.url)
            }
            _ => {
                let message = extract_message(&body)
                    .unwrap_or_else(|| format!("Image host returned {}", status));
                warn!("Image host rejected {}: {}", file.file_name, message);
                Err(Self::rejected(file, message))
            }
        }
    }
}

/// Upload files in order, stopping at the first failure.
///
/// Either every file yields a URL or nothing is returned; the error names the
/// failing file by 1-based position.
pub async fn upload_all(host: &dyn ImageHost, files: &[ImageFile]) -> ClientResult<Vec<String>> {
    let mut urls = Vec::with_capacity(files.len());

    for (index, file) in files.iter().enumerate() {
        match host.upload(file).await {
            Ok(url) => urls.push(url),
            Err(ClientError::Config(reason)) => return Err(ClientError::Config(reason)),
            Err(err) => {
                let message = match err {
                    ClientError::Upload { message, .. } => message,
                    other => other.user_message(),
                };
                warn!(
                    "Stopping uploads at image {} of {} ({})",
                    index + 1,
                    files.len(),
                    file.file_name
                );
                return Err(ClientError::Upload {
                    position: index + 1,
                    file_name: file.file_name.clone(),
                    message,
                });
            }
        }
    }

    Ok(urls)
}
