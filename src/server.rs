//! HTTP server: shared state, error mapping and the merged router.

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use crate::admin::admin_routes;
use crate::config::PortalConfig;
use crate::dashboard::dashboard_routes;
use crate::error::{ApplicationError, AuthError, DatabaseError, Error, ValidationError};
use crate::onboarding::onboarding_routes;
use crate::session::{Identity, SessionContext, SessionRegistry, session_routes};
use crate::store::RecordStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct PortalState {
    pub store: Arc<dyn RecordStore>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<PortalConfig>,
}

impl PortalState {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self {
            store: Arc::clone(sessions.store()),
            config: Arc::clone(sessions.config()),
            sessions,
        }
    }

    /// Identity from the request headers, if any.
    pub fn identity(&self, headers: &HeaderMap) -> Option<Identity> {
        Identity::from_headers(headers, &self.config)
    }

    /// The caller's session. Anonymous requests are rejected.
    pub async fn caller(&self, headers: &HeaderMap) -> Result<Arc<SessionContext>, Error> {
        let identity = self.identity(headers).ok_or(AuthError::Unauthenticated)?;
        Ok(self.sessions.session(identity).await)
    }

    /// The caller's session, which must belong to an administrator.
    pub async fn admin(
        &self,
        headers: &HeaderMap,
        action: &str,
    ) -> Result<Arc<SessionContext>, Error> {
        let session = self.caller(headers).await?;
        if !session.is_admin() {
            warn!(user_id = %session.user_id(), action, "Non-admin attempted admin action");
            return Err(AuthError::AdminRequired {
                action: action.to_string(),
            }
            .into());
        }
        Ok(session)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(ValidationError::StepNotReached { .. }) => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Auth(AuthError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            Error::Auth(_) => StatusCode::FORBIDDEN,
            Error::Application(ApplicationError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Application(ApplicationError::Terminal { .. }) => StatusCode::CONFLICT,
            Error::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Database(_) | Error::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let message = match &self {
            Error::Validation(e) => e.to_string(),
            Error::Auth(e) => e.to_string(),
            Error::Application(e) => e.to_string(),
            Error::Database(DatabaseError::NotFound { .. }) => self.to_string(),
            Error::Database(_) | Error::Config(_) => {
                error!(error = %self, "Request failed");
                "The record store is unavailable, please try again".to_string()
            }
        };

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "retryable": status == StatusCode::SERVICE_UNAVAILABLE,
            })),
        )
            .into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "onboarding-portal"
    }))
}

fn cors_layer(config: &PortalConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static(crate::session::identity::USER_ID_HEADER),
            header::HeaderName::from_static(crate::session::identity::USER_EMAIL_HEADER),
        ]);

    match config.allowed_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(e)) => {
            warn!(error = %e, "Ignoring invalid PORTAL_ALLOWED_ORIGIN, allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

/// Build the full portal router.
pub fn portal_routes(state: PortalState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(health))
        .merge(session_routes(state.clone()))
        .merge(onboarding_routes(state.clone()))
        .merge(dashboard_routes(state.clone()))
        .merge(admin_routes(state))
        .layer(cors)
}
