//! Agreement acceptance records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof that a user accepted the onboarding agreements.
///
/// Written once; a second acceptance for the same user keeps the original row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: Uuid,
    pub user_id: String,
    pub version: String,
    pub agreed_at: DateTime<Utc>,
}

impl Agreement {
    pub fn new(user_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            version: version.into(),
            agreed_at: Utc::now(),
        }
    }
}

/// The three checkboxes presented on the agreement page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementAcceptance {
    #[serde(default)]
    pub terms: bool,
    #[serde(default)]
    pub privacy: bool,
    #[serde(default)]
    pub confidentiality: bool,
}

impl AgreementAcceptance {
    pub fn all() -> Self {
        Self {
            terms: true,
            privacy: true,
            confidentiality: true,
        }
    }

    /// Names of the agreements that were left unchecked.
    pub fn missing(&self) -> Vec<String> {
        [
            (self.terms, "terms"),
            (self.privacy, "privacy"),
            (self.confidentiality, "confidentiality"),
        ]
        .into_iter()
        .filter(|(accepted, _)| !accepted)
        .map(|(_, name)| name.to_string())
        .collect()
    }
}
