//! Error types for the onboarding portal.

use crate::onboarding::step::Step;
use crate::records::ApplicationStatus;

/// Top-level error type for the portal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Application error: {0}")]
    Application(#[from] ApplicationError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Input rejected before it reaches the record store.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("All agreements must be accepted (missing: {})", .0.join(", "))]
    AgreementsNotAccepted(Vec<String>),

    #[error("File is too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("File is empty")]
    EmptyFile,

    #[error("Unsupported file type {file_type}, expected one of {allowed}")]
    UnsupportedFileType { file_type: String, allowed: String },

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Required documents not uploaded: {}", .0.join(", "))]
    MissingDocuments(Vec<String>),

    #[error("Finish the {current} step before {required}")]
    StepNotReached { current: Step, required: Step },
}

/// Application lifecycle errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("No application found for user {user_id}")]
    NotFound { user_id: String },

    #[error("Application is already {status} and cannot change")]
    Terminal { status: ApplicationStatus },
}

/// Authorization failures. None of these leave partial state behind.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Administrator access required for {action}")]
    AdminRequired { action: String },

    #[error("{resource} {id} does not belong to the caller")]
    NotOwner { resource: String, id: String },
}

/// Result type alias for the portal.
pub type Result<T> = std::result::Result<T, Error>;
