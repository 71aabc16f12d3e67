//! Employee profile record and the partial update applied by the profile form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fields that must be non-blank for the profile step to count as done.
pub const REQUIRED_PROFILE_FIELDS: [&str; 3] = ["first_name", "last_name", "phone"];

/// Personal and employment details for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A partial profile update. Absent fields are left untouched; blank
/// strings clear the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub employee_id: Option<String>,
    pub join_date: Option<NaiveDate>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn merge_text(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        let trimmed = v.trim();
        *target = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
}

impl Profile {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            first_name: None,
            last_name: None,
            phone: None,
            gender: None,
            date_of_birth: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            emergency_contact_relation: None,
            department: None,
            position: None,
            employee_id: None,
            join_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// First name, last name and phone are all present and non-blank.
    pub fn is_complete(&self) -> bool {
        !is_blank(&self.first_name) && !is_blank(&self.last_name) && !is_blank(&self.phone)
    }

    /// "First Last" when both names are known.
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }

    /// Apply a partial update and bump `updated_at`.
    pub fn apply(&mut self, fields: &ProfileFields) {
        merge_text(&mut self.first_name, &fields.first_name);
        merge_text(&mut self.last_name, &fields.last_name);
        merge_text(&mut self.phone, &fields.phone);
        merge_text(&mut self.gender, &fields.gender);
        merge_text(&mut self.address, &fields.address);
        merge_text(&mut self.city, &fields.city);
        merge_text(&mut self.state, &fields.state);
        merge_text(&mut self.zip_code, &fields.zip_code);
        merge_text(&mut self.country, &fields.country);
        merge_text(&mut self.emergency_contact_name, &fields.emergency_contact_name);
        merge_text(&mut self.emergency_contact_phone, &fields.emergency_contact_phone);
        merge_text(
            &mut self.emergency_contact_relation,
            &fields.emergency_contact_relation,
        );
        merge_text(&mut self.department, &fields.department);
        merge_text(&mut self.position, &fields.position);
        merge_text(&mut self.employee_id, &fields.employee_id);
        if fields.date_of_birth.is_some() {
            self.date_of_birth = fields.date_of_birth;
        }
        if fields.join_date.is_some() {
            self.join_date = fields.join_date;
        }
        self.updated_at = Utc::now();
    }
}

impl ProfileFields {
    /// Required fields that are absent or blank in this update.
    pub fn missing_required(&self) -> Vec<String> {
        [
            (&self.first_name, REQUIRED_PROFILE_FIELDS[0]),
            (&self.last_name, REQUIRED_PROFILE_FIELDS[1]),
            (&self.phone, REQUIRED_PROFILE_FIELDS[2]),
        ]
        .into_iter()
        .filter(|(value, _)| is_blank(value))
        .map(|(_, name)| name.to_string())
        .collect()
    }
}
