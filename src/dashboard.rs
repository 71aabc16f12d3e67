//! User dashboard: tasks, upcoming events and resources, plus the task
//! status endpoint.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DatabaseError, Error};
use crate::onboarding::Step;
use crate::records::{Application, Event, Resource, Task, TaskCounts, TaskStatus};
use crate::server::PortalState;
use crate::store::RecordStore;

/// Everything the user dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub display_name: Option<String>,
    pub step: Option<Step>,
    pub application: Option<Application>,
    pub tasks: Vec<Task>,
    pub task_counts: TaskCounts,
    pub upcoming_events: Vec<Event>,
    pub resources: Vec<Resource>,
}

/// Assemble the dashboard for `user_id` as of `today`.
pub async fn load_dashboard(
    store: &dyn RecordStore,
    user_id: &str,
    today: NaiveDate,
) -> Result<Dashboard, DatabaseError> {
    let (profile, application, tasks, upcoming_events, resources) = tokio::try_join!(
        store.get_profile(user_id),
        store.get_application(user_id),
        store.list_tasks(user_id),
        store.list_upcoming_events(today),
        store.list_resources(),
    )?;

    Ok(Dashboard {
        display_name: profile.and_then(|p| p.display_name()),
        step: None,
        application,
        task_counts: TaskCounts::tally(&tasks),
        tasks,
        upcoming_events,
        resources,
    })
}

/// GET /api/dashboard
async fn get_dashboard(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Json<Dashboard>, Error> {
    let session = state.caller(&headers).await?;
    let today = Utc::now().date_naive();
    let mut dashboard = load_dashboard(state.store.as_ref(), session.user_id(), today).await?;
    dashboard.step = session.current_step();
    Ok(Json(dashboard))
}

#[derive(Debug, Deserialize)]
struct TaskStatusRequest {
    status: TaskStatus,
}

/// POST /api/tasks/{id}/status
async fn update_task_status(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<TaskStatusRequest>,
) -> Result<Json<Task>, Error> {
    let session = state.caller(&headers).await?;
    let task = session.update_task_status(id, req.status).await?;
    Ok(Json(task))
}

/// Build the dashboard routes.
pub fn dashboard_routes(state: PortalState) -> Router {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/tasks/{id}/status", post(update_task_status))
        .with_state(state)
}
