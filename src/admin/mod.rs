//! Admin operations: reviewing applications and publishing tasks, events
//! and resources.
//!
//! Callers must have checked the admin flag already; the HTTP layer does
//! that in `PortalState::admin`.

pub mod routes;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApplicationError, DatabaseError, Result, ValidationError};
use crate::records::{
    AdminAction, Application, ApplicationStatus, Event, Resource, Task, TaskPriority,
    transition_application,
};
use crate::store::RecordStore;

pub use routes::admin_routes;

/// An application with the applicant's display name, for the review table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationOverview {
    #[serde(flatten)]
    pub application: Application,
    pub applicant_name: Option<String>,
}

/// Number of applications in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: ApplicationStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub total: usize,
    /// One entry per status, in lifecycle order, zeros included.
    pub by_status: Vec<StatusCount>,
}

impl ApplicationSummary {
    pub fn count(&self, status: ApplicationStatus) -> usize {
        self.by_status
            .iter()
            .find(|c| c.status == status)
            .map_or(0, |c| c.count)
    }
}

pub fn summarize(applications: &[Application]) -> ApplicationSummary {
    let by_status = ApplicationStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: applications.iter().filter(|a| a.status == status).count(),
        })
        .collect();
    ApplicationSummary {
        total: applications.len(),
        by_status,
    }
}

/// Every application with its applicant's name, most recently updated first.
pub async fn list_applications(
    store: &dyn RecordStore,
) -> std::result::Result<Vec<ApplicationOverview>, DatabaseError> {
    let applications = store.list_applications().await?;
    let mut overviews = Vec::with_capacity(applications.len());
    for application in applications {
        let applicant_name = store
            .get_profile(&application.user_id)
            .await?
            .and_then(|p| p.display_name());
        overviews.push(ApplicationOverview {
            application,
            applicant_name,
        });
    }
    Ok(overviews)
}

/// Apply an admin action to a user's application and persist it.
pub async fn review_application(
    store: &dyn RecordStore,
    user_id: &str,
    action: AdminAction,
    notes: Option<String>,
    reviewer: &str,
) -> Result<Application> {
    let current = store
        .get_application(user_id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound {
            user_id: user_id.to_string(),
        })?;

    let next = transition_application(&current, action, notes)?;
    let saved = store
        .update_application_status(user_id, next.status, next.admin_notes.as_deref())
        .await?
        .into_result(user_id)?;

    info!(
        user_id,
        reviewer,
        from = %current.status,
        to = %saved.status,
        "Application transitioned"
    );
    Ok(saved)
}

fn require_title(title: &str) -> std::result::Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::MissingFields(vec!["title".into()]));
    }
    Ok(title.to_string())
}

/// Body of `POST /api/admin/tasks`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: TaskPriority,
}

pub async fn assign_task(store: &dyn RecordStore, new: NewTask, assigned_by: &str) -> Result<Task> {
    let title = require_title(&new.title)?;
    if new.user_id.trim().is_empty() {
        return Err(ValidationError::MissingFields(vec!["user_id".into()]).into());
    }

    let mut task = Task::new(new.user_id.trim(), title)
        .with_priority(new.priority)
        .assigned_by(assigned_by);
    if let Some(description) = new.description.filter(|d| !d.trim().is_empty()) {
        task = task.with_description(description);
    }
    if let Some(due) = new.due_date {
        task = task.with_due_date(due);
    }

    store.create_task(&task).await?;
    info!(task_id = %task.id, user_id = %task.user_id, assigned_by, "Task assigned");
    Ok(task)
}

/// Body of `POST /api/admin/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
}

pub async fn publish_event(store: &dyn RecordStore, new: NewEvent) -> Result<Event> {
    let mut event = Event::new(require_title(&new.title)?, new.date);
    event.description = new.description;
    event.time = new.time;
    event.event_type = new.event_type;
    store.create_event(&event).await?;
    info!(event_id = %event.id, date = %event.date, "Event published");
    Ok(event)
}

/// Body of `POST /api/admin/resources`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewResource {
    pub title: String,
    pub resource_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

pub async fn publish_resource(store: &dyn RecordStore, new: NewResource) -> Result<Resource> {
    let title = require_title(&new.title)?;
    if new.resource_type.trim().is_empty() {
        return Err(ValidationError::MissingFields(vec!["resource_type".into()]).into());
    }
    let mut resource = Resource::new(title, new.resource_type.trim());
    resource.description = new.description;
    resource.url = new.url;
    store.create_resource(&resource).await?;
    info!(resource_id = %resource.id, "Resource published");
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::records::{ProfileFields, TaskStatus};
    use crate::store::LibSqlBackend;

    async fn store_with_application(user_id: &str) -> LibSqlBackend {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store.create_application(user_id).await.unwrap();
        store
    }

    #[test]
    fn summary_counts_every_status() {
        let mut a = Application::new("u1");
        a.status = ApplicationStatus::UnderReview;
        let mut b = Application::new("u2");
        b.status = ApplicationStatus::UnderReview;
        let c = Application::new("u3");

        let summary = summarize(&[a, b, c]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_status.len(), ApplicationStatus::ALL.len());
        assert_eq!(summary.count(ApplicationStatus::UnderReview), 2);
        assert_eq!(summary.count(ApplicationStatus::Submitted), 1);
        assert_eq!(summary.count(ApplicationStatus::Selected), 0);
    }

    #[tokio::test]
    async fn review_moves_and_records_notes() {
        let store = store_with_application("u1").await;
        let app = review_application(
            &store,
            "u1",
            AdminAction::ScheduleInterview,
            Some("Thursday 2pm".into()),
            "hr@admin.com",
        )
        .await
        .unwrap();
        assert_eq!(app.status, ApplicationStatus::InterviewScheduled);
        assert_eq!(app.admin_notes.as_deref(), Some("Thursday 2pm"));

        let app = review_application(&store, "u1", AdminAction::Approve, None, "hr@admin.com")
            .await
            .unwrap();
        assert_eq!(app.status, ApplicationStatus::Selected);
        assert_eq!(app.admin_notes.as_deref(), Some("Thursday 2pm"));
    }

    #[tokio::test]
    async fn terminal_application_refuses_review() {
        let store = store_with_application("u1").await;
        review_application(&store, "u1", AdminAction::Reject, None, "hr@admin.com")
            .await
            .unwrap();

        let err = review_application(&store, "u1", AdminAction::Approve, None, "hr@admin.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Application(ApplicationError::Terminal {
                status: ApplicationStatus::Rejected
            })
        ));
        let stored = store.get_application("u1").await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Rejected);
    }

    #[tokio::test]
    async fn concurrent_decisions_keep_the_first() {
        let store = store_with_application("u1").await;
        let (approve, reject) = tokio::join!(
            review_application(&store, "u1", AdminAction::Approve, None, "a@admin.com"),
            review_application(&store, "u1", AdminAction::Reject, None, "b@admin.com"),
        );

        let winner = match (approve, reject) {
            (Ok(app), Err(Error::Application(ApplicationError::Terminal { status })))
            | (Err(Error::Application(ApplicationError::Terminal { status })), Ok(app)) => {
                assert_eq!(status, app.status);
                app.status
            }
            other => panic!("expected exactly one decision to land, got {other:?}"),
        };
        let stored = store.get_application("u1").await.unwrap().unwrap();
        assert_eq!(stored.status, winner);
    }

    #[tokio::test]
    async fn review_without_application_is_not_found() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let err = review_application(&store, "ghost", AdminAction::MarkReviewing, None, "hr@admin.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Application(ApplicationError::NotFound { .. })));
    }

    #[tokio::test]
    async fn overview_includes_applicant_name() {
        let store = store_with_application("u1").await;
        store.create_application("u2").await.unwrap();
        store
            .upsert_profile(
                "u1",
                &ProfileFields {
                    first_name: Some("Ada".into()),
                    last_name: Some("Lovelace".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let overviews = list_applications(&store).await.unwrap();
        assert_eq!(overviews.len(), 2);
        let ada = overviews
            .iter()
            .find(|o| o.application.user_id == "u1")
            .unwrap();
        assert_eq!(ada.applicant_name.as_deref(), Some("Ada Lovelace"));
        let other = overviews
            .iter()
            .find(|o| o.application.user_id == "u2")
            .unwrap();
        assert!(other.applicant_name.is_none());
    }

    #[tokio::test]
    async fn assign_task_validates_and_stores() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let err = assign_task(
            &store,
            NewTask {
                user_id: "u1".into(),
                title: "  ".into(),
                description: None,
                due_date: None,
                priority: TaskPriority::Low,
            },
            "hr@admin.com",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let task = assign_task(
            &store,
            NewTask {
                user_id: "u1".into(),
                title: "Complete I-9".into(),
                description: Some("Bring ID".into()),
                due_date: NaiveDate::from_ymd_opt(2026, 11, 3),
                priority: TaskPriority::High,
            },
            "hr@admin.com",
        )
        .await
        .unwrap();
        let stored = store.list_tasks("u1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, task.id);
        assert_eq!(stored[0].status, TaskStatus::Pending);
        assert_eq!(stored[0].assigned_by.as_deref(), Some("hr@admin.com"));
    }

    #[tokio::test]
    async fn publish_reference_data() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        publish_event(
            &store,
            NewEvent {
                title: "Orientation".into(),
                date,
                description: None,
                time: Some("09:30 AM".into()),
                event_type: Some("meeting".into()),
            },
        )
        .await
        .unwrap();
        publish_resource(
            &store,
            NewResource {
                title: "Handbook".into(),
                resource_type: "document".into(),
                description: None,
                url: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(store.list_upcoming_events(date).await.unwrap().len(), 1);
        assert_eq!(store.list_resources().await.unwrap().len(), 1);
        assert!(
            publish_resource(
                &store,
                NewResource {
                    title: "x".into(),
                    resource_type: " ".into(),
                    description: None,
                    url: None,
                },
            )
            .await
            .is_err()
        );
    }
}
