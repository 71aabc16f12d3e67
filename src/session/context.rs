//! Per-user session: holds the resolved onboarding step and runs the
//! user-side onboarding operations.
//!
//! State lives in a `watch` channel: `Loading` until the first refresh,
//! then `Resolved`, and `Closed` after sign-out. Every mutation is validated
//! first, written, then followed by a refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PortalConfig;
use crate::error::{ApplicationError, AuthError, DatabaseError, Result, ValidationError};
use crate::onboarding::guard::{self, AccessRequest, Decision, SessionView};
use crate::onboarding::step::{OnboardingRecords, Resolution, Step, resolve_for_user};
use crate::records::{
    Agreement, AgreementAcceptance, Application, Document, DocumentUpload, Profile, ProfileFields,
    Task, TaskStatus, missing_required,
};
use crate::session::identity::Identity;
use crate::store::{RecordStore, StatusUpdate};
use crate::validation;

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Resolved(Resolution),
    Closed,
}

/// One signed-in user's session.
pub struct SessionContext {
    identity: Identity,
    store: Arc<dyn RecordStore>,
    config: Arc<PortalConfig>,
    state: watch::Sender<SessionState>,
    /// Bumped when a refresh starts; only the latest refresh may publish.
    generation: AtomicU64,
    opened_at: Instant,
    /// Milliseconds after `opened_at` of the last request.
    last_active_ms: AtomicU64,
}

impl SessionContext {
    pub fn new(identity: Identity, store: Arc<dyn RecordStore>, config: Arc<PortalConfig>) -> Self {
        let (state, _rx) = watch::channel(SessionState::Loading);
        Self {
            identity,
            store,
            config,
            state,
            generation: AtomicU64::new(0),
            opened_at: Instant::now(),
            last_active_ms: AtomicU64::new(0),
        }
    }

    /// Record activity on this session.
    pub fn touch(&self) {
        let elapsed = u64::try_from(self.opened_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time since the last request.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::Relaxed));
        self.opened_at.elapsed().saturating_sub(last)
    }

    /// Whether a WebSocket client is watching this session.
    pub fn has_subscribers(&self) -> bool {
        self.state.receiver_count() > 0
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.identity.is_admin
    }

    /// Watch state changes. Each WS client calls this.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Closed)
    }

    /// The resolved step, or `None` while loading or after close.
    pub fn current_step(&self) -> Option<Step> {
        match &*self.state.borrow() {
            SessionState::Resolved(resolution) => Some(resolution.step),
            _ => None,
        }
    }

    /// What the access guard sees for this session.
    pub fn view(&self) -> SessionView {
        match &*self.state.borrow() {
            SessionState::Loading => SessionView::Loading,
            SessionState::Resolved(resolution) => SessionView::Authenticated {
                is_admin: self.identity.is_admin,
                current_step: resolution.step,
            },
            SessionState::Closed => SessionView::Anonymous,
        }
    }

    pub fn check_access(&self, request: &AccessRequest) -> Option<Decision> {
        guard::check_access(request, &self.view())
    }

    /// Recompute the step from the store and publish it.
    ///
    /// A refresh that was overtaken by a later one does not publish, and a
    /// closed session stays closed.
    pub async fn refresh(&self) -> Resolution {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let resolution =
            resolve_for_user(self.store.as_ref(), &self.identity.user_id, self.identity.is_admin)
                .await;

        let published = self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Closed) {
                return false;
            }
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            let next = SessionState::Resolved(resolution.clone());
            if *state == next {
                return false;
            }
            *state = next;
            true
        });

        if published {
            debug!(
                user_id = %self.identity.user_id,
                step = %resolution.step,
                degraded = resolution.is_degraded(),
                "Session step updated"
            );
        }
        resolution
    }

    /// Mark the session closed and wake every subscriber.
    pub fn close(&self) {
        self.state.send_replace(SessionState::Closed);
        info!(user_id = %self.identity.user_id, "Session closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(AuthError::Unauthenticated.into());
        }
        Ok(())
    }

    /// Refuse a write for a step the user has not reached yet.
    ///
    /// Reads the records fresh, so a stale or degraded session state cannot
    /// let a step be skipped. Store errors propagate instead of failing closed.
    async fn require_step(&self, required: Step) -> Result<()> {
        if self.is_admin() {
            return Ok(());
        }
        let current = OnboardingRecords::load(self.store.as_ref(), self.user_id())
            .await?
            .resolve(false);
        if current < required {
            debug!(user_id = %self.user_id(), %current, %required, "Write ahead of current step");
            return Err(ValidationError::StepNotReached { current, required }.into());
        }
        Ok(())
    }

    // ── Onboarding operations ───────────────────────────────────────

    /// Record agreement acceptance. All three boxes must be checked.
    pub async fn accept_agreement(&self, acceptance: &AgreementAcceptance) -> Result<Agreement> {
        self.ensure_open()?;
        validation::validate_acceptance(acceptance)?;

        let agreement = self
            .store
            .create_agreement(self.user_id(), &self.config.agreement_version)
            .await?;
        info!(user_id = %self.user_id(), version = %agreement.version, "Agreement accepted");

        self.refresh().await;
        Ok(agreement)
    }

    pub async fn save_profile(&self, fields: &ProfileFields) -> Result<Profile> {
        self.ensure_open()?;
        validation::validate_profile(fields)?;
        self.require_step(Step::ProfileInfo).await?;

        let profile = self.store.upsert_profile(self.user_id(), fields).await?;
        info!(user_id = %self.user_id(), "Profile saved");

        self.refresh().await;
        Ok(profile)
    }

    /// Record metadata for a file already pushed to object storage.
    pub async fn upload_document(&self, upload: &DocumentUpload) -> Result<Document> {
        self.ensure_open()?;
        validation::validate_upload(upload, self.config.max_upload_bytes)?;
        self.require_step(Step::DocumentUpload).await?;

        let document = self.store.put_document(self.user_id(), upload).await?;
        info!(
            user_id = %self.user_id(),
            document_type = %document.document_type,
            file_size = document.file_size,
            "Document recorded"
        );

        self.refresh().await;
        Ok(document)
    }

    /// Submit the uploaded documents for review, creating the application
    /// on first submission.
    pub async fn submit_documents(&self) -> Result<Application> {
        self.ensure_open()?;
        self.require_step(Step::DocumentUpload).await?;

        let documents = self.store.list_documents(self.user_id()).await?;
        let missing = missing_required(&documents);
        if !missing.is_empty() {
            return Err(ValidationError::MissingDocuments(
                missing.iter().map(ToString::to_string).collect(),
            )
            .into());
        }

        let mut application = self.store.create_application(self.user_id()).await?;
        if application.submit_for_review() {
            application = match self
                .store
                .update_application_status(self.user_id(), application.status, None)
                .await?
            {
                // A decision landed first; report it as is.
                StatusUpdate::Updated(app) | StatusUpdate::Final(app) => app,
                StatusUpdate::Missing => {
                    return Err(ApplicationError::NotFound {
                        user_id: self.user_id().to_string(),
                    }
                    .into());
                }
            };
        }
        info!(user_id = %self.user_id(), status = %application.status, "Documents submitted");

        self.refresh().await;
        Ok(application)
    }

    /// Change the status of one of the caller's own tasks.
    pub async fn update_task_status(&self, task_id: Uuid, status: TaskStatus) -> Result<Task> {
        self.ensure_open()?;

        let not_found = || DatabaseError::NotFound {
            entity: "task".into(),
            id: task_id.to_string(),
        };
        let task = self.store.get_task(task_id).await?.ok_or_else(not_found)?;
        if task.user_id != self.user_id() {
            return Err(AuthError::NotOwner {
                resource: "task".into(),
                id: task_id.to_string(),
            }
            .into());
        }

        let task = self
            .store
            .update_task_status(task_id, status)
            .await?
            .ok_or_else(not_found)?;
        info!(user_id = %self.user_id(), task_id = %task_id, status = ?status, "Task updated");
        Ok(task)
    }
}
