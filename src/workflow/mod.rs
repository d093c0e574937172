//! CRUD workflow controllers.
//!
//! A [`CrudController`] drives one resource view: list on mount, a create or
//! edit form, delete with an explicit confirmation step. What it lists and how
//! it writes is supplied by a workflow type implementing [`Listing`] and
//! optionally [`Deletable`] and [`Editable`].
//!
//! State lives behind a mutex that is only held between suspension points,
//! so every transition is atomic to anyone reading a [`WorkflowState`]
//! snapshot. Once a controller is unmounted, responses that arrive later are
//! dropped without touching items or messages. A list response is also
//! dropped when a newer load or a write started after it was requested.

mod comments;
mod projects;

pub use comments::*;
pub use projects::*;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::DeleteOutcome;
use crate::errors::{ClientError, ClientResult};

/// Lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Submitting,
    /// The last load failed
    Error,
}

/// Whether the form creates a new entry or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Create,
    Editing { id: String },
}

/// Everything a view needs to render a resource page.
#[derive(Debug, Clone)]
pub struct WorkflowState<T, D> {
    pub phase: Phase,
    pub items: Vec<T>,
    pub draft: D,
    pub mode: FormMode,
    /// Entry awaiting delete confirmation
    pub pending_delete: Option<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl<T, D: Default> Default for WorkflowState<T, D> {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            items: Vec::new(),
            draft: D::default(),
            mode: FormMode::Create,
            pending_delete: None,
            error: None,
            notice: None,
        }
    }
}

impl<T, D> WorkflowState<T, D> {
    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Submitting
    }
}

/// A resource view that can be listed.
#[async_trait]
pub trait Listing: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;
    type Draft: Default + Clone + Send + Sync + 'static;

    /// Short label used in logs.
    const NAME: &'static str;

    fn item_id(item: &Self::Item) -> &str;

    async fn list(&self) -> ClientResult<Vec<Self::Item>>;
}

#[async_trait]
pub trait Deletable: Listing {
    async fn delete(&self, id: &str) -> ClientResult<DeleteOutcome>;
}

/// A resource view with a create (and optionally edit) form.
#[async_trait]
pub trait Editable: Listing {
    /// Local checks run before anything is sent.
    fn validate(&self, draft: &Self::Draft) -> ClientResult<()>;

    async fn create(&self, draft: Self::Draft) -> ClientResult<()>;

    async fn update(&self, _id: &str, _draft: Self::Draft) -> ClientResult<()> {
        Err(ClientError::Validation(
            "This entry cannot be edited.".to_string(),
        ))
    }

    /// Form contents for editing an existing entry; `None` if not editable.
    fn draft_from(&self, _item: &Self::Item) -> Option<Self::Draft> {
        None
    }

    fn success_notice(&self, _mode: &FormMode) -> Option<String> {
        None
    }
}

/// Generic controller for one resource view.
pub struct CrudController<W: Listing> {
    workflow: Arc<W>,
    state: Arc<Mutex<WorkflowState<W::Item, W::Draft>>>,
    mounted: Arc<AtomicBool>,
    /// Bumped by every load and every write; older list responses are stale
    generation: Arc<AtomicU64>,
}

impl<W: Listing> Clone for CrudController<W> {
    fn clone(&self) -> Self {
        Self {
            workflow: Arc::clone(&self.workflow),
            state: Arc::clone(&self.state),
            mounted: Arc::clone(&self.mounted),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<W: Listing> CrudController<W> {
    pub fn new(workflow: W) -> Self {
        Self {
            workflow: Arc::new(workflow),
            state: Arc::new(Mutex::new(WorkflowState::default())),
            mounted: Arc::new(AtomicBool::new(true)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn workflow(&self) -> &W {
        &self.workflow
    }

    pub fn snapshot(&self) -> WorkflowState<W::Item, W::Draft> {
        self.state.lock().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Attach the view and populate the list.
    pub async fn mount(&self) -> ClientResult<()> {
        self.mounted.store(true, Ordering::SeqCst);
        self.refresh().await
    }

    /// Detach the view. Responses still in flight are discarded on arrival.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        debug!("{} view unmounted", W::NAME);
    }

    /// Fetch the list again. A failure keeps the previous list.
    pub async fn refresh(&self) -> ClientResult<()> {
        let generation = {
            let mut state = self.state.lock();
            if state.is_busy() {
                return Err(ClientError::Busy);
            }
            state.phase = Phase::Loading;
            state.error = None;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let result = self.workflow.list().await;
        if !self.is_mounted() {
            debug!("Dropping {} list response for unmounted view", W::NAME);
            return result.map(|_| ());
        }

        let mut state = self.state.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Dropping stale {} list response", W::NAME);
            return result.map(|_| ());
        }
        match result {
            Ok(items) => {
                debug!("Loaded {} {} entries", items.len(), W::NAME);
                state.items = items;
                state.phase = Phase::Ready;
                Ok(())
            }
            Err(err) => {
                warn!("Failed to load {}: {}", W::NAME, err);
                state.phase = Phase::Error;
                state.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    pub fn dismiss_error(&self) {
        let mut state = self.state.lock();
        state.error = None;
        if state.phase == Phase::Error {
            state.phase = Phase::Ready;
        }
    }

    pub fn dismiss_notice(&self) {
        self.state.lock().notice = None;
    }

    /// Edit the form contents in place.
    pub fn update_draft<R>(&self, edit: impl FnOnce(&mut W::Draft) -> R) -> R {
        edit(&mut self.state.lock().draft)
    }

    /// Enter `Submitting`. Loads still in flight become stale.
    ///
    /// Callers check `is_busy` under the same lock first.
    fn enter_submitting(&self, state: &mut WorkflowState<W::Item, W::Draft>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.phase = Phase::Submitting;
        state.error = None;
        state.notice = None;
    }

    /// Leave `Submitting` after the view went away, applying nothing.
    fn release(&self) {
        let mut state = self.state.lock();
        if state.phase == Phase::Submitting {
            state.phase = Phase::Idle;
        }
    }

    /// Record a failed mutation: back to `Ready`, list unchanged.
    fn fail(&self, err: ClientError) -> ClientError {
        if self.is_mounted() {
            let mut state = self.state.lock();
            state.phase = Phase::Ready;
            state.error = Some(err.user_message());
        } else {
            self.release();
        }
        err
    }

    /// Re-read the list after a successful write and return to `Ready`.
    async fn reconcile(&self) {
        let result = self.workflow.list().await;
        if !self.is_mounted() {
            self.release();
            return;
        }

        let mut state = self.state.lock();
        state.phase = Phase::Ready;
        match result {
            Ok(items) => state.items = items,
            Err(err) => {
                warn!("Failed to re-fetch {} after a change: {}", W::NAME, err);
                state.error = Some(err.user_message());
            }
        }
    }
}

impl<W: Deletable> CrudController<W> {
    /// Ask for confirmation before deleting `id`. Sends nothing.
    pub fn request_delete(&self, id: &str) -> ClientResult<()> {
        let mut state = self.state.lock();
        if state.is_busy() {
            return Err(ClientError::Busy);
        }
        if !state.items.iter().any(|item| W::item_id(item) == id) {
            return Err(ClientError::NotFound(format!("No {} entry {}", W::NAME, id)));
        }
        state.pending_delete = Some(id.to_string());
        Ok(())
    }

    pub fn cancel_delete(&self) {
        self.state.lock().pending_delete = None;
    }

    /// Issue the DELETE for the entry awaiting confirmation.
    pub async fn confirm_delete(&self) -> ClientResult<DeleteOutcome> {
        let id = {
            let mut state = self.state.lock();
            if state.is_busy() {
                return Err(ClientError::Busy);
            }
            let Some(id) = state.pending_delete.take() else {
                return Err(ClientError::Validation(
                    "Select an entry to delete first.".to_string(),
                ));
            };
            self.enter_submitting(&mut state);
            id
        };

        let result = self.workflow.delete(&id).await;
        if !self.is_mounted() {
            self.release();
            return result;
        }

        match result {
            Ok(outcome) => {
                self.state
                    .lock()
                    .items
                    .retain(|item| W::item_id(item) != id);
                info!("Removed {} entry {} ({:?})", W::NAME, id, outcome);
                self.reconcile().await;
                Ok(outcome)
            }
            Err(err) => Err(self.fail(err)),
        }
    }
}

impl<W: Editable> CrudController<W> {
    /// Load an existing entry into the form and switch submit to update.
    pub fn edit(&self, id: &str) -> ClientResult<()> {
        let mut state = self.state.lock();
        if state.is_busy() {
            return Err(ClientError::Busy);
        }

        let item = state
            .items
            .iter()
            .find(|item| W::item_id(item) == id)
            .ok_or_else(|| ClientError::NotFound(format!("No {} entry {}", W::NAME, id)))?;
        let draft = self.workflow.draft_from(item).ok_or_else(|| {
            ClientError::Validation("This entry cannot be edited.".to_string())
        })?;

        state.draft = draft;
        state.mode = FormMode::Editing { id: id.to_string() };
        state.error = None;
        state.notice = None;
        Ok(())
    }

    /// Back to an empty create form. Sends nothing.
    pub fn cancel_edit(&self) {
        let mut state = self.state.lock();
        state.draft = W::Draft::default();
        state.mode = FormMode::Create;
        state.error = None;
    }

    /// Validate and send the form.
    ///
    /// Validation failures set the inline error and change nothing else.
    pub async fn submit(&self) -> ClientResult<()> {
        let (draft, mode) = {
            let mut state = self.state.lock();
            if state.is_busy() {
                return Err(ClientError::Busy);
            }
            state.error = None;
            state.notice = None;
            if let Err(err) = self.workflow.validate(&state.draft) {
                state.error = Some(err.user_message());
                return Err(err);
            }
            self.enter_submitting(&mut state);
            (state.draft.clone(), state.mode.clone())
        };

        let result = match &mode {
            FormMode::Create => self.workflow.create(draft).await,
            FormMode::Editing { id } => self.workflow.update(id, draft).await,
        };
        if !self.is_mounted() {
            debug!("Dropping {} submit response for unmounted view", W::NAME);
            self.release();
            return result;
        }

        match result {
            Ok(()) => {
                {
                    let mut state = self.state.lock();
                    state.draft = W::Draft::default();
                    state.mode = FormMode::Create;
                    state.notice = self.workflow.success_notice(&mode);
                }
                self.reconcile().await;
                Ok(())
            }
            Err(err) => {
                warn!("{} submission failed: {}", W::NAME, err);
                Err(self.fail(err))
            }
        }
    }
}
