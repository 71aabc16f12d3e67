//! Access guard: decides whether a navigation is allowed or redirected,
//! given what the route requires and what the session knows.

use serde::{Deserialize, Serialize};

use super::step::Step;

pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_LOGIN_PATH: &str = "/admin-login";
pub const USER_LANDING_PATH: &str = "/user-dashboard";
pub const ADMIN_LANDING_PATH: &str = "/admin-dashboard";

/// What a route demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub requires_auth: bool,
    pub requires_admin: bool,
    pub required_step: Option<Step>,
}

impl AccessRequest {
    /// Pages for signed-out visitors only (login screens).
    pub fn guest() -> Self {
        Self {
            requires_auth: false,
            requires_admin: false,
            required_step: None,
        }
    }

    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            requires_admin: false,
            required_step: None,
        }
    }

    pub fn step(step: Step) -> Self {
        Self {
            required_step: Some(step),
            ..Self::authenticated()
        }
    }

    pub fn admin() -> Self {
        Self {
            requires_admin: true,
            ..Self::authenticated()
        }
    }
}

/// What the guard knows about the caller at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionView {
    /// Identity or step still being resolved.
    Loading,
    Anonymous,
    Authenticated { is_admin: bool, current_step: Step },
}

/// Guard outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "to", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    RedirectTo(String),
}

impl Decision {
    fn redirect(path: &str) -> Self {
        Self::RedirectTo(path.to_string())
    }
}

/// Apply the access rules in order. Returns `None` while the session is
/// loading: the caller must wait rather than redirect on partial data.
///
/// Any step at or before the current one may be revisited; only forward
/// jumps are redirected.
pub fn check_access(request: &AccessRequest, session: &SessionView) -> Option<Decision> {
    let (is_admin, current_step) = match *session {
        SessionView::Loading => return None,
        SessionView::Anonymous => {
            if request.requires_auth {
                return Some(Decision::redirect(LOGIN_PATH));
            }
            return Some(Decision::Allow);
        }
        SessionView::Authenticated {
            is_admin,
            current_step,
        } => (is_admin, current_step),
    };

    if request.requires_admin && !is_admin {
        return Some(Decision::redirect(USER_LANDING_PATH));
    }

    if !request.requires_auth {
        let landing = if is_admin {
            ADMIN_LANDING_PATH
        } else {
            USER_LANDING_PATH
        };
        return Some(Decision::redirect(landing));
    }

    match request.required_step {
        Some(required) if current_step.index() < required.index() => {
            Some(Decision::redirect(current_step.path()))
        }
        _ => Some(Decision::Allow),
    }
}

/// How a path is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// No guard at all.
    Open,
    Guarded(AccessRequest),
    NotFound,
}

/// Strip query, fragment and trailing slash.
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// The portal's route table.
pub fn route_access(path: &str) -> RouteAccess {
    let path = normalize(path);
    match path {
        "/" => RouteAccess::Open,
        LOGIN_PATH | ADMIN_LOGIN_PATH => RouteAccess::Guarded(AccessRequest::guest()),
        USER_LANDING_PATH => RouteAccess::Guarded(AccessRequest::step(Step::Completed)),
        ADMIN_LANDING_PATH => RouteAccess::Guarded(AccessRequest::admin()),
        _ => Step::ALL
            .iter()
            .find(|step| !step.is_terminal() && step.path() == path)
            .map(|step| RouteAccess::Guarded(AccessRequest::step(*step)))
            .unwrap_or(RouteAccess::NotFound),
    }
}

/// Result of guarding a concrete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteCheck {
    NotFound,
    /// Session still loading; try again once it resolves.
    Pending,
    Decided(Decision),
}

/// Route table lookup followed by `check_access`. Open routes always allow.
pub fn guard_path(path: &str, session: &SessionView) -> RouteCheck {
    match route_access(path) {
        RouteAccess::NotFound => RouteCheck::NotFound,
        RouteAccess::Open => RouteCheck::Decided(Decision::Allow),
        RouteAccess::Guarded(request) => match check_access(&request, session) {
            Some(decision) => RouteCheck::Decided(decision),
            None => RouteCheck::Pending,
        },
    }
}
