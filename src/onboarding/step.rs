//! Step resolution: computes which onboarding step a user is on from
//! their agreement, profile, document, and application records.
//!
//! Steps progress linearly: Agreement → ProfileInfo → DocumentUpload →
//! ApplicationStatus → Completed. Resolution is pure; loading the records is
//! the only part that touches the store.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DatabaseError;
use crate::records::{Agreement, Application, Document, Profile, missing_required};
use crate::store::RecordStore;

/// The onboarding steps, in order. Declaration order is the step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Agreement,
    ProfileInfo,
    DocumentUpload,
    ApplicationStatus,
    Completed,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Agreement,
        Step::ProfileInfo,
        Step::DocumentUpload,
        Step::ApplicationStatus,
        Step::Completed,
    ];

    /// Position in the onboarding sequence, starting at 0.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The route a user on this step is sent to.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Agreement => "/agreement",
            Self::ProfileInfo => "/profile-info",
            Self::DocumentUpload => "/document-upload",
            Self::ApplicationStatus => "/application-status",
            Self::Completed => "/user-dashboard",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agreement => "agreement",
            Self::ProfileInfo => "profile-info",
            Self::DocumentUpload => "document-upload",
            Self::ApplicationStatus => "application-status",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the current step. First matching rule wins:
///
/// 1. admins are always `Completed`
/// 2. a selected or rejected application is `Completed`
/// 3. no agreement → `Agreement`
/// 4. missing or incomplete profile → `ProfileInfo`
/// 5. any required document type missing → `DocumentUpload`
/// 6. otherwise → `ApplicationStatus`
pub fn resolve_step(
    agreement: Option<&Agreement>,
    profile: Option<&Profile>,
    documents: &[Document],
    application: Option<&Application>,
    is_admin: bool,
) -> Step {
    if is_admin {
        return Step::Completed;
    }
    if application.is_some_and(|app| app.status.is_terminal()) {
        return Step::Completed;
    }
    if agreement.is_none() {
        return Step::Agreement;
    }
    if !profile.is_some_and(Profile::is_complete) {
        return Step::ProfileInfo;
    }
    if !missing_required(documents).is_empty() {
        return Step::DocumentUpload;
    }
    Step::ApplicationStatus
}

/// Everything the resolver looks at for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnboardingRecords {
    pub agreement: Option<Agreement>,
    pub profile: Option<Profile>,
    pub documents: Vec<Document>,
    pub application: Option<Application>,
}

impl OnboardingRecords {
    /// Fetch the four inputs concurrently. Missing rows are `None`/empty.
    pub async fn load(store: &dyn RecordStore, user_id: &str) -> Result<Self, DatabaseError> {
        let (agreement, profile, documents, application) = tokio::try_join!(
            store.get_agreement(user_id),
            store.get_profile(user_id),
            store.list_documents(user_id),
            store.get_application(user_id),
        )?;
        Ok(Self {
            agreement,
            profile,
            documents,
            application,
        })
    }

    pub fn resolve(&self, is_admin: bool) -> Step {
        resolve_step(
            self.agreement.as_ref(),
            self.profile.as_ref(),
            &self.documents,
            self.application.as_ref(),
            is_admin,
        )
    }
}

/// Shown to the user when their records could not be loaded.
pub const RETRY_NOTICE: &str = "Could not load your onboarding records, please try again";

/// A resolved step plus an optional user-facing notice.
///
/// When the records could not be loaded the resolution fails closed to
/// `Agreement` and `notice` says the lookup should be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub step: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl Resolution {
    pub fn resolved(step: Step) -> Self {
        Self { step, notice: None }
    }

    pub fn fail_closed(err: &DatabaseError) -> Self {
        warn!(error = %err, "Step resolution failed, falling back to agreement");
        Self {
            step: Step::Agreement,
            notice: Some(RETRY_NOTICE.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.notice.is_some()
    }
}

/// Load and resolve in one go, failing closed on store errors.
pub async fn resolve_for_user(store: &dyn RecordStore, user_id: &str, is_admin: bool) -> Resolution {
    if is_admin {
        return Resolution::resolved(Step::Completed);
    }
    match OnboardingRecords::load(store, user_id).await {
        Ok(records) => Resolution::resolved(records.resolve(false)),
        Err(e) => Resolution::fail_closed(&e),
    }
}
