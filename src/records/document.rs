//! Uploaded document metadata. The bytes live in external object storage.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kinds of document a candidate can upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Resume,
    Class10,
    Class12,
    Degree,
    Profile,
    Experience,
}

/// Document types that must be uploaded before the application can be tracked.
pub const REQUIRED_DOCUMENTS: [DocumentType; 3] = [
    DocumentType::Resume,
    DocumentType::Class10,
    DocumentType::Class12,
];

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::Class10 => "class10",
            Self::Class12 => "class12",
            Self::Degree => "degree",
            Self::Profile => "profile",
            Self::Experience => "experience",
        }
    }

    pub fn is_required(&self) -> bool {
        REQUIRED_DOCUMENTS.contains(self)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document row. One per (user, document type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: String,
    pub document_type: DocumentType,
    pub file_name: String,
    /// MIME type reported by the uploader, e.g. `application/pdf`.
    pub file_type: String,
    pub file_size: u64,
    /// Object-storage key: `{user_id}/{document_type}/{file_name}`.
    pub file_path: String,
    pub uploaded_at: DateTime<Utc>,
    pub verified: bool,
}

/// What the uploader tells us about a file it has pushed to object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    pub file_size: u64,
}

impl DocumentUpload {
    /// Object-storage key for this upload.
    pub fn storage_path(&self, user_id: &str) -> String {
        format!("{user_id}/{}/{}", self.document_type, self.file_name)
    }
}

/// Required document types not present in `documents`, in canonical order.
pub fn missing_required(documents: &[Document]) -> Vec<DocumentType> {
    let uploaded: HashSet<DocumentType> = documents.iter().map(|d| d.document_type).collect();
    REQUIRED_DOCUMENTS
        .into_iter()
        .filter(|t| !uploaded.contains(t))
        .collect()
}
