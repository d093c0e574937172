//! Project endpoints.

use reqwest::multipart::Form;
use reqwest::Method;
use tracing::info;

use super::{Resource, ResourceGateway};
use crate::errors::ClientResult;
use crate::models::{Project, ProjectFields};
use crate::upload::ImageFile;

impl Resource for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }
}

impl ResourceGateway<Project> {
    /// Create a project by posting its fields and image binaries together.
    ///
    /// The server stores the images itself; `fields.images` is ignored.
    pub async fn create_multipart(
        &self,
        fields: &ProjectFields,
        files: &[ImageFile],
    ) -> ClientResult<Project> {
        let form = project_form(fields, files)?;
        let request = self
            .client
            .request(Method::POST, &[Project::COLLECTION], true)
            .await?
            .multipart(form);

        let created: Project = self.client.send_json(request).await?;
        info!(
            "Created project {} with {} uploaded images",
            created.id,
            files.len()
        );
        Ok(created)
    }
}

fn project_form(fields: &ProjectFields, files: &[ImageFile]) -> ClientResult<Form> {
    let mut form = Form::new()
        .text("name", fields.name.clone())
        .text("github", fields.github.clone().unwrap_or_default())
        .text("live", fields.live.clone().unwrap_or_default())
        .text("description", fields.description.clone().unwrap_or_default())
        .text("technologies", serde_json::to_string(&fields.technologies)?);

    for file in files {
        form = form.part("images", file.part()?);
    }
    Ok(form)
}
