//! REST endpoints for the user-side onboarding steps.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::{DatabaseError, Error};
use crate::records::{AgreementAcceptance, DocumentUpload, ProfileFields, missing_required};
use crate::server::PortalState;
use crate::session::SessionContext;

/// A written record plus the session state after the write.
fn written(
    key: &str,
    record: impl serde::Serialize,
    session: &SessionContext,
) -> Result<Response, Error> {
    let mut body = serde_json::Map::new();
    body.insert(
        key.to_string(),
        serde_json::to_value(record).map_err(|e| DatabaseError::Serialization(e.to_string()))?,
    );
    body.insert(
        "session".to_string(),
        serde_json::to_value(session.state())
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
    );
    Ok(Json(serde_json::Value::Object(body)).into_response())
}

fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// GET /api/onboarding/agreement
async fn get_agreement(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    let agreement = state.store.get_agreement(session.user_id()).await?;
    Ok(Json(serde_json::json!({
        "accepted": agreement.is_some(),
        "agreement": agreement,
        "version": state.config.agreement_version,
    }))
    .into_response())
}

/// POST /api/onboarding/agreement
async fn accept_agreement(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Json(acceptance): Json<AgreementAcceptance>,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    let agreement = session.accept_agreement(&acceptance).await?;
    written("agreement", agreement, &session)
}

/// GET /api/onboarding/profile
///
/// Returns the profile, or 404 if none has been saved yet.
async fn get_profile(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    Ok(match state.store.get_profile(session.user_id()).await? {
        Some(profile) => Json(profile).into_response(),
        None => not_found("No profile exists yet"),
    })
}

/// PUT /api/onboarding/profile
async fn save_profile(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Json(fields): Json<ProfileFields>,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    let profile = session.save_profile(&fields).await?;
    written("profile", profile, &session)
}

/// GET /api/onboarding/documents
async fn list_documents(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    let documents = state.store.list_documents(session.user_id()).await?;
    let missing = missing_required(&documents);
    Ok(Json(serde_json::json!({
        "documents": documents,
        "missing_required": missing,
        "max_upload_bytes": state.config.max_upload_bytes,
    }))
    .into_response())
}

/// POST /api/onboarding/documents
async fn upload_document(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Json(upload): Json<DocumentUpload>,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    let document = session.upload_document(&upload).await?;
    written("document", document, &session)
}

/// POST /api/onboarding/documents/submit
async fn submit_documents(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    let application = session.submit_documents().await?;
    written("application", application, &session)
}

/// GET /api/onboarding/application
async fn get_application(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    Ok(match state.store.get_application(session.user_id()).await? {
        Some(application) => Json(application).into_response(),
        None => not_found("No application submitted yet"),
    })
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: PortalState) -> Router {
    Router::new()
        .route(
            "/api/onboarding/agreement",
            get(get_agreement).post(accept_agreement),
        )
        .route(
            "/api/onboarding/profile",
            get(get_profile).put(save_profile),
        )
        .route(
            "/api/onboarding/documents",
            get(list_documents).post(upload_document),
        )
        .route("/api/onboarding/documents/submit", post(submit_documents))
        .route("/api/onboarding/application", get(get_application))
        .with_state(state)
}
