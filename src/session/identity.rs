//! Caller identity asserted by the upstream auth provider.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::config::PortalConfig;

pub const USER_ID_HEADER: &str = "x-portal-user-id";
pub const USER_EMAIL_HEADER: &str = "x-portal-user-email";

/// Who is calling. The admin flag is derived from the email suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, config: &PortalConfig) -> Self {
        let email = email.into();
        Self {
            user_id: user_id.into(),
            is_admin: config.is_admin_email(&email),
            email,
        }
    }

    /// Read identity headers. `None` means the request is anonymous.
    pub fn from_headers(headers: &HeaderMap, config: &PortalConfig) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let user_id = header(USER_ID_HEADER)?;
        let email = header(USER_EMAIL_HEADER).unwrap_or_default();
        Some(Self::new(user_id, email, config))
    }
}
