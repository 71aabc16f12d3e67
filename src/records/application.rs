//! Application record and the admin-driven status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApplicationError;

/// Where a candidate's application stands.
///
/// `Selected` and `Rejected` are terminal: once reached, nothing moves the
/// application again. Between non-terminal statuses any move is allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    #[default]
    Submitted,
    UnderReview,
    InterviewScheduled,
    PendingDocuments,
    Selected,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        Self::Submitted,
        Self::UnderReview,
        Self::InterviewScheduled,
        Self::PendingDocuments,
        Self::Selected,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderReview => "under-review",
            Self::InterviewScheduled => "interview-scheduled",
            Self::PendingDocuments => "pending-documents",
            Self::Selected => "selected",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Selected | Self::Rejected)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buttons on the admin review screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminAction {
    MarkReviewing,
    ScheduleInterview,
    RequestDocuments,
    Reject,
    Approve,
}

impl AdminAction {
    /// The status this action moves an application to.
    pub fn target(&self) -> ApplicationStatus {
        match self {
            Self::MarkReviewing => ApplicationStatus::UnderReview,
            Self::ScheduleInterview => ApplicationStatus::InterviewScheduled,
            Self::RequestDocuments => ApplicationStatus::PendingDocuments,
            Self::Reject => ApplicationStatus::Rejected,
            Self::Approve => ApplicationStatus::Selected,
        }
    }
}

/// A candidate's application. One per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub user_id: String,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            status: ApplicationStatus::Submitted,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The candidate-side move after documents are (re)submitted.
    ///
    /// `Submitted` and `PendingDocuments` go to `UnderReview`; anything else
    /// is left alone. Returns whether the status changed.
    pub fn submit_for_review(&mut self) -> bool {
        match self.status {
            ApplicationStatus::Submitted | ApplicationStatus::PendingDocuments => {
                self.status = ApplicationStatus::UnderReview;
                self.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

/// Apply an admin action, returning the updated application.
///
/// Notes, when given, replace the stored admin notes.
pub fn transition_application(
    app: &Application,
    action: AdminAction,
    notes: Option<String>,
) -> Result<Application, ApplicationError> {
    if app.status.is_terminal() {
        return Err(ApplicationError::Terminal { status: app.status });
    }
    let mut next = app.clone();
    next.status = action.target();
    if notes.is_some() {
        next.admin_notes = notes;
    }
    next.updated_at = Utc::now();
    Ok(next)
}
