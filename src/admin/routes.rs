//! Admin REST endpoints. Every handler checks the admin flag first.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::{
    ApplicationOverview, ApplicationSummary, NewEvent, NewResource, NewTask, assign_task,
    list_applications, publish_event, publish_resource, review_application, summarize,
};
use crate::error::Error;
use crate::records::{AdminAction, Application};
use crate::server::PortalState;

/// GET /api/admin/applications
async fn get_applications(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ApplicationOverview>>, Error> {
    state.admin(&headers, "list applications").await?;
    Ok(Json(list_applications(state.store.as_ref()).await?))
}

/// GET /api/admin/applications/summary
async fn get_summary(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Json<ApplicationSummary>, Error> {
    state.admin(&headers, "view application summary").await?;
    let applications = state.store.list_applications().await?;
    Ok(Json(summarize(&applications)))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    action: AdminAction,
    #[serde(default)]
    notes: Option<String>,
}

/// POST /api/admin/applications/{user_id}/transition
async fn transition(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Application>, Error> {
    let admin = state.admin(&headers, "transition application").await?;
    let notes = req.notes.filter(|n| !n.trim().is_empty());
    let application = review_application(
        state.store.as_ref(),
        &user_id,
        req.action,
        notes,
        &admin.identity().email,
    )
    .await?;
    Ok(Json(application))
}

/// POST /api/admin/tasks
async fn create_task(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Json(new): Json<NewTask>,
) -> Result<impl IntoResponse, Error> {
    let admin = state.admin(&headers, "assign task").await?;
    let task = assign_task(state.store.as_ref(), new, &admin.identity().email).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// POST /api/admin/events
async fn create_event(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Json(new): Json<NewEvent>,
) -> Result<impl IntoResponse, Error> {
    state.admin(&headers, "publish event").await?;
    let event = publish_event(state.store.as_ref(), new).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// POST /api/admin/resources
async fn create_resource(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Json(new): Json<NewResource>,
) -> Result<impl IntoResponse, Error> {
    state.admin(&headers, "publish resource").await?;
    let resource = publish_resource(state.store.as_ref(), new).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// Build the admin REST routes.
pub fn admin_routes(state: PortalState) -> Router {
    Router::new()
        .route("/api/admin/applications", get(get_applications))
        .route("/api/admin/applications/summary", get(get_summary))
        .route(
            "/api/admin/applications/{user_id}/transition",
            post(transition),
        )
        .route("/api/admin/tasks", post(create_task))
        .route("/api/admin/events", post(create_event))
        .route("/api/admin/resources", post(create_resource))
        .with_state(state)
}
