//! `RecordStore` trait: single async interface for all onboarding persistence.
//!
//! Lookups that find nothing return `Ok(None)` (or an empty list). A missing
//! row is an unsatisfied step, never an error.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{ApplicationError, DatabaseError};
use crate::records::{
    Agreement, Application, ApplicationStatus, Document, DocumentUpload, Event, Profile,
    ProfileFields, Resource, Task, TaskStatus,
};

/// Outcome of a conditional application status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Updated(Application),
    /// Already selected or rejected. The stored row is returned unchanged.
    Final(Application),
    /// The user has no application.
    Missing,
}

impl StatusUpdate {
    /// Treat anything but a successful write as an error.
    pub fn into_result(self, user_id: &str) -> Result<Application, ApplicationError> {
        match self {
            Self::Updated(app) => Ok(app),
            Self::Final(app) => Err(ApplicationError::Terminal { status: app.status }),
            Self::Missing => Err(ApplicationError::NotFound {
                user_id: user_id.to_string(),
            }),
        }
    }
}

/// Backend-agnostic record store covering every onboarding entity.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Agreements ──────────────────────────────────────────────────

    async fn get_agreement(&self, user_id: &str) -> Result<Option<Agreement>, DatabaseError>;

    /// Record acceptance. Returns the existing row if the user already agreed.
    async fn create_agreement(
        &self,
        user_id: &str,
        version: &str,
    ) -> Result<Agreement, DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    /// Create the profile if missing, then apply `fields`.
    async fn upsert_profile(
        &self,
        user_id: &str,
        fields: &ProfileFields,
    ) -> Result<Profile, DatabaseError>;

    // ── Documents ───────────────────────────────────────────────────

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, DatabaseError>;

    /// Record an upload, replacing any earlier row of the same type.
    async fn put_document(
        &self,
        user_id: &str,
        upload: &DocumentUpload,
    ) -> Result<Document, DatabaseError>;

    // ── Applications ────────────────────────────────────────────────

    async fn get_application(&self, user_id: &str) -> Result<Option<Application>, DatabaseError>;

    /// Create a `submitted` application, or return the existing one.
    async fn create_application(&self, user_id: &str) -> Result<Application, DatabaseError>;

    /// Set the status (and notes, when given) in a single conditional write.
    /// A selected or rejected application is never overwritten.
    async fn update_application_status(
        &self,
        user_id: &str,
        status: ApplicationStatus,
        admin_notes: Option<&str>,
    ) -> Result<StatusUpdate, DatabaseError>;

    /// All applications, most recently updated first.
    async fn list_applications(&self) -> Result<Vec<Application>, DatabaseError>;

    // ── Tasks ───────────────────────────────────────────────────────

    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError>;

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError>;

    /// Update a task's status. `Ok(None)` if the task does not exist.
    async fn update_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, DatabaseError>;

    // ── Reference data ──────────────────────────────────────────────

    async fn create_event(&self, event: &Event) -> Result<(), DatabaseError>;

    /// Events on or after `from`, soonest first.
    async fn list_upcoming_events(&self, from: NaiveDate) -> Result<Vec<Event>, DatabaseError>;

    async fn create_resource(&self, resource: &Resource) -> Result<(), DatabaseError>;

    async fn list_resources(&self) -> Result<Vec<Resource>, DatabaseError>;
}
