//! Session endpoints and the session WebSocket.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::context::{SessionContext, SessionState};
use crate::error::{AuthError, Error};
use crate::onboarding::guard::{RouteCheck, SessionView, guard_path};
use crate::server::PortalState;

/// Messages pushed to `/ws/session` clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionMessage {
    /// Full current state. Sent on connect and after every change.
    SessionSync { state: SessionState },
    /// The session was signed out; the socket closes next.
    SessionClosed,
}

/// Build the session routes.
pub fn session_routes(state: PortalState) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/session/sign-out", post(sign_out))
        .route("/api/session/access", get(check_access))
        .route("/ws/session", get(ws_handler))
        .with_state(state)
}

/// GET /api/session
async fn get_session(State(state): State<PortalState>, headers: HeaderMap) -> Response {
    let Some(identity) = state.identity(&headers) else {
        return Json(serde_json::json!({ "authenticated": false })).into_response();
    };
    let session = state.sessions.session(identity).await;
    Json(serde_json::json!({
        "authenticated": true,
        "identity": session.identity(),
        "session": session.state(),
    }))
    .into_response()
}

/// POST /api/session/sign-out
async fn sign_out(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<StatusCode, Error> {
    let identity = state.identity(&headers).ok_or(AuthError::Unauthenticated)?;
    let existed = state.sessions.sign_out(&identity.user_id).await;
    debug!(user_id = %identity.user_id, existed, "Sign-out");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AccessQuery {
    path: String,
}

/// GET /api/session/access?path=/document-upload
async fn check_access(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
) -> Response {
    let view = match state.identity(&headers) {
        Some(identity) => state.sessions.session(identity).await.view(),
        None => SessionView::Anonymous,
    };

    match guard_path(&query.path, &view) {
        RouteCheck::NotFound => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Unknown route {}", query.path) })),
        )
            .into_response(),
        RouteCheck::Pending => Json(serde_json::json!({ "decision": "pending" })).into_response(),
        RouteCheck::Decided(decision) => Json(decision).into_response(),
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let session = state.caller(&headers).await?;
    info!(user_id = %session.user_id(), "Session WebSocket client connecting");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session)))
}

async fn send_message(socket: &mut WebSocket, msg: &SessionMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize session message");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, session: Arc<SessionContext>) {
    let mut rx = session.subscribe();

    // Send current state on connect
    let initial = rx.borrow_and_update().clone();
    if !send_message(&mut socket, &SessionMessage::SessionSync { state: initial }).await {
        warn!("Failed to send initial session sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("Session dropped");
                    break;
                }
                let state = rx.borrow_and_update().clone();
                if state == SessionState::Closed {
                    let _ = send_message(&mut socket, &SessionMessage::SessionClosed).await;
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                if !send_message(&mut socket, &SessionMessage::SessionSync { state }).await {
                    debug!("Client disconnected during send");
                    break;
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Session WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(text = %text.as_str(), "Ignoring client message on session socket");
                    }
                    _ => {}
                }
            }
        }
    }

    info!(user_id = %session.user_id(), "Session WebSocket connection closed");
}
