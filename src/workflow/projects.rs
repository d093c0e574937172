//! Project views: the public showcase and the admin editor.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{CrudController, Deletable, Editable, FormMode, Listing};
use crate::api::{DeleteOutcome, ResourceGateway};
use crate::errors::{ClientError, ClientResult};
use crate::models::{
    merge_images, optional_field, parse_technologies, Project, ProjectFields, MAX_PROJECT_IMAGES,
};
use crate::upload::{upload_all, ImageFile, ImageHost, INVALID_IMAGE};

pub const PROJECT_ADDED: &str = "Project added successfully!";
pub const PROJECT_UPDATED: &str = "Project updated successfully!";

/// Project form contents.
///
/// `technologies` is the raw comma-separated input. Images already stored on
/// the project and newly picked files are kept apart until submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDraft {
    pub name: String,
    pub github: String,
    pub live: String,
    pub description: String,
    pub technologies: String,
    pub existing_images: Vec<String>,
    pub new_images: Vec<ImageFile>,
}

impl ProjectDraft {
    pub fn from_project(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            github: project.github.clone().unwrap_or_default(),
            live: project.live.clone().unwrap_or_default(),
            description: project.description.clone().unwrap_or_default(),
            technologies: project.technologies.join(", "),
            existing_images: project.images.clone(),
            new_images: Vec::new(),
        }
    }

    /// Queue a picked file for upload.
    pub fn add_image(&mut self, file: ImageFile) -> ClientResult<()> {
        if !file.is_image() {
            return Err(ClientError::Validation(INVALID_IMAGE.to_string()));
        }
        if self.new_images.len() >= MAX_PROJECT_IMAGES {
            return Err(ClientError::Validation(format!(
                "You can only add a maximum of {} images.",
                MAX_PROJECT_IMAGES
            )));
        }
        self.new_images.push(file);
        Ok(())
    }

    pub fn remove_image(&mut self, index: usize) -> Option<ImageFile> {
        (index < self.new_images.len()).then(|| self.new_images.remove(index))
    }

    pub fn remove_existing_image(&mut self, index: usize) -> Option<String> {
        (index < self.existing_images.len()).then(|| self.existing_images.remove(index))
    }

    pub fn image_count(&self) -> usize {
        self.existing_images.len() + self.new_images.len()
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.name.trim().is_empty() {
            return Err(ClientError::Validation(
                "Project name is required.".to_string(),
            ));
        }
        if self.image_count() == 0 {
            return Err(ClientError::Validation(
                "Please add at least one image before submitting.".to_string(),
            ));
        }
        Ok(())
    }

    /// Full field set, with stored images first and uploads after, capped.
    pub fn fields(&self, uploaded: &[String]) -> ProjectFields {
        ProjectFields {
            name: self.name.trim().to_string(),
            github: optional_field(&self.github),
            live: optional_field(&self.live),
            description: optional_field(&self.description),
            technologies: parse_technologies(&self.technologies),
            images: merge_images(&self.existing_images, uploaded),
        }
    }
}

/// Public projects page.
pub struct ProjectShowcase {
    gateway: ResourceGateway<Project>,
}

impl ProjectShowcase {
    pub fn new(gateway: ResourceGateway<Project>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Listing for ProjectShowcase {
    type Item = Project;
    type Draft = ();
    const NAME: &'static str = "project";

    fn item_id(item: &Project) -> &str {
        &item.id
    }

    async fn list(&self) -> ClientResult<Vec<Project>> {
        self.gateway.list().await
    }
}

/// Admin project editor: images go to the image host, URLs to the API.
pub struct ProjectAdmin {
    gateway: ResourceGateway<Project>,
    images: Arc<dyn ImageHost>,
}

impl ProjectAdmin {
    pub fn new(gateway: ResourceGateway<Project>, images: Arc<dyn ImageHost>) -> Self {
        Self { gateway, images }
    }

    /// Upload the draft's new files and build the field set to send.
    async fn prepare(&self, draft: &ProjectDraft) -> ClientResult<ProjectFields> {
        let uploaded = upload_all(self.images.as_ref(), &draft.new_images).await?;
        debug!("Uploaded {} new project images", uploaded.len());
        Ok(draft.fields(&uploaded))
    }
}

#[async_trait]
impl Listing for ProjectAdmin {
    type Item = Project;
    type Draft = ProjectDraft;
    const NAME: &'static str = "project";

    fn item_id(item: &Project) -> &str {
        &item.id
    }

    async fn list(&self) -> ClientResult<Vec<Project>> {
        self.gateway.list().await
    }
}

#[async_trait]
impl Deletable for ProjectAdmin {
    async fn delete(&self, id: &str) -> ClientResult<DeleteOutcome> {
        self.gateway.delete(id).await
    }
}

#[async_trait]
impl Editable for ProjectAdmin {
    fn validate(&self, draft: &ProjectDraft) -> ClientResult<()> {
        draft.validate()
    }

    async fn create(&self, draft: ProjectDraft) -> ClientResult<()> {
        let fields = self.prepare(&draft).await?;
        self.gateway.create(&fields).await?;
        Ok(())
    }

    async fn update(&self, id: &str, draft: ProjectDraft) -> ClientResult<()> {
        let fields = self.prepare(&draft).await?;
        self.gateway.update(id, &fields).await?;
        Ok(())
    }

    fn draft_from(&self, item: &Project) -> Option<ProjectDraft> {
        Some(ProjectDraft::from_project(item))
    }

    fn success_notice(&self, mode: &FormMode) -> Option<String> {
        Some(match mode {
            FormMode::Create => PROJECT_ADDED.to_string(),
            FormMode::Editing { .. } => PROJECT_UPDATED.to_string(),
        })
    }
}

impl CrudController<ProjectAdmin> {
    /// Add a picked file to the form, showing the rejection inline.
    pub fn add_image(&self, file: ImageFile) -> ClientResult<()> {
        let mut state = self.state.lock();
        match state.draft.add_image(file) {
            Ok(()) => {
                state.error = None;
                Ok(())
            }
            Err(err) => {
                state.error = Some(err.user_message());
                Err(err)
            }
        }
    }
}
