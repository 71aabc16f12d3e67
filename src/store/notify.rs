//! Change notifications: a `RecordStore` decorator that broadcasts a
//! `RecordChange` after every successful mutation.
//!
//! Sessions subscribe to recompute their step when the records behind it
//! change, instead of polling.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::records::{
    Agreement, Application, ApplicationStatus, Document, DocumentUpload, Event, Profile,
    ProfileFields, Resource, Task, TaskStatus,
};
use crate::store::traits::{RecordStore, StatusUpdate};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Which kind of record was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Agreement,
    Profile,
    Document,
    Application,
    Task,
    Event,
    Resource,
}

impl RecordKind {
    /// Whether a write of this kind can move a user's onboarding step.
    pub fn affects_step(&self) -> bool {
        matches!(
            self,
            Self::Agreement | Self::Profile | Self::Document | Self::Application
        )
    }
}

/// A successful write. `user_id` is `None` for reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordChange {
    pub user_id: Option<String>,
    pub kind: RecordKind,
}

impl RecordChange {
    pub fn for_user(user_id: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            user_id: Some(user_id.into()),
            kind,
        }
    }

    pub fn global(kind: RecordKind) -> Self {
        Self {
            user_id: None,
            kind,
        }
    }
}

/// Wraps a store and publishes `RecordChange`s for its writes.
pub struct NotifyingStore<S> {
    inner: S,
    tx: broadcast::Sender<RecordChange>,
}

impl<S: RecordStore> NotifyingStore<S> {
    pub fn new(inner: S) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self { inner, tx }
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordChange> {
        self.tx.subscribe()
    }

    fn publish(&self, change: RecordChange) {
        debug!(user_id = ?change.user_id, kind = ?change.kind, "Record changed");
        // Ok if nobody is listening
        let _ = self.tx.send(change);
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for NotifyingStore<S> {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.inner.run_migrations().await
    }

    async fn get_agreement(&self, user_id: &str) -> Result<Option<Agreement>, DatabaseError> {
        self.inner.get_agreement(user_id).await
    }

    async fn create_agreement(
        &self,
        user_id: &str,
        version: &str,
    ) -> Result<Agreement, DatabaseError> {
        let agreement = self.inner.create_agreement(user_id, version).await?;
        self.publish(RecordChange::for_user(user_id, RecordKind::Agreement));
        Ok(agreement)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        self.inner.get_profile(user_id).await
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        fields: &ProfileFields,
    ) -> Result<Profile, DatabaseError> {
        let profile = self.inner.upsert_profile(user_id, fields).await?;
        self.publish(RecordChange::for_user(user_id, RecordKind::Profile));
        Ok(profile)
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>, DatabaseError> {
        self.inner.list_documents(user_id).await
    }

    async fn put_document(
        &self,
        user_id: &str,
        upload: &DocumentUpload,
    ) -> Result<Document, DatabaseError> {
        let document = self.inner.put_document(user_id, upload).await?;
        self.publish(RecordChange::for_user(user_id, RecordKind::Document));
        Ok(document)
    }

    async fn get_application(&self, user_id: &str) -> Result<Option<Application>, DatabaseError> {
        self.inner.get_application(user_id).await
    }

    async fn create_application(&self, user_id: &str) -> Result<Application, DatabaseError> {
        let app = self.inner.create_application(user_id).await?;
        self.publish(RecordChange::for_user(user_id, RecordKind::Application));
        Ok(app)
    }

    async fn update_application_status(
        &self,
        user_id: &str,
        status: ApplicationStatus,
        admin_notes: Option<&str>,
    ) -> Result<StatusUpdate, DatabaseError> {
        let outcome = self
            .inner
            .update_application_status(user_id, status, admin_notes)
            .await?;
        if matches!(outcome, StatusUpdate::Updated(_)) {
            self.publish(RecordChange::for_user(user_id, RecordKind::Application));
        }
        Ok(outcome)
    }

    async fn list_applications(&self) -> Result<Vec<Application>, DatabaseError> {
        self.inner.list_applications().await
    }

    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.inner.create_task(task).await?;
        self.publish(RecordChange::for_user(&task.user_id, RecordKind::Task));
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        self.inner.list_tasks(user_id).await
    }

    async fn update_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, DatabaseError> {
        let task = self.inner.update_task_status(id, status).await?;
        if let Some(t) = &task {
            self.publish(RecordChange::for_user(&t.user_id, RecordKind::Task));
        }
        Ok(task)
    }

    async fn create_event(&self, event: &Event) -> Result<(), DatabaseError> {
        self.inner.create_event(event).await?;
        self.publish(RecordChange::global(RecordKind::Event));
        Ok(())
    }

    async fn list_upcoming_events(&self, from: NaiveDate) -> Result<Vec<Event>, DatabaseError> {
        self.inner.list_upcoming_events(from).await
    }

    async fn create_resource(&self, resource: &Resource) -> Result<(), DatabaseError> {
        self.inner.create_resource(resource).await?;
        self.publish(RecordChange::global(RecordKind::Resource));
        Ok(())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, DatabaseError> {
        self.inner.list_resources().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    async fn test_store() -> NotifyingStore<LibSqlBackend> {
        NotifyingStore::new(LibSqlBackend::new_memory().await.unwrap())
    }

    #[test]
    fn step_kinds() {
        assert!(RecordKind::Agreement.affects_step());
        assert!(RecordKind::Application.affects_step());
        assert!(!RecordKind::Task.affects_step());
        assert!(!RecordKind::Resource.affects_step());
    }

    #[tokio::test]
    async fn writes_are_broadcast() {
        let store = test_store().await;
        let mut rx = store.subscribe();

        store.create_agreement("u1", "1.0").await.unwrap();
        store
            .upsert_profile("u1", &ProfileFields::default())
            .await
            .unwrap();
        store.create_event(&Event::new("Orientation", NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            RecordChange::for_user("u1", RecordKind::Agreement)
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            RecordChange::for_user("u1", RecordKind::Profile)
        );
        assert_eq!(rx.recv().await.unwrap(), RecordChange::global(RecordKind::Event));
    }

    #[tokio::test]
    async fn reads_and_missed_updates_are_silent() {
        let store = test_store().await;
        let mut rx = store.subscribe();

        store.get_agreement("u1").await.unwrap();
        store.list_documents("u1").await.unwrap();
        let missing = store
            .update_application_status("u1", ApplicationStatus::Selected, None)
            .await
            .unwrap();
        assert_eq!(missing, StatusUpdate::Missing);

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn refused_final_write_is_silent() {
        let store = test_store().await;
        store.create_application("u1").await.unwrap();
        store
            .update_application_status("u1", ApplicationStatus::Rejected, None)
            .await
            .unwrap();

        let mut rx = store.subscribe();
        let outcome = store
            .update_application_status("u1", ApplicationStatus::Selected, None)
            .await
            .unwrap();
        assert!(matches!(outcome, StatusUpdate::Final(_)));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn task_update_reports_assignee() {
        let store = test_store().await;
        let task = Task::new("u7", "Badge photo");
        store.create_task(&task).await.unwrap();

        let mut rx = store.subscribe();
        store
            .update_task_status(task.id, TaskStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            RecordChange::for_user("u7", RecordKind::Task)
        );
    }
}
