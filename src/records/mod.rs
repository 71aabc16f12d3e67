//! Record types persisted by the record store.
//!
//! Every record is keyed by the opaque user id handed to us by the auth
//! provider. Agreements are write-once, profiles and documents are upserted,
//! applications move through admin-owned statuses, and events/resources are
//! reference data with no lifecycle.

pub mod agreement;
pub mod application;
pub mod document;
pub mod profile;
pub mod reference;
pub mod task;

pub use agreement::{Agreement, AgreementAcceptance};
pub use application::{AdminAction, Application, ApplicationStatus, transition_application};
pub use document::{Document, DocumentType, DocumentUpload, REQUIRED_DOCUMENTS, missing_required};
pub use profile::{Profile, ProfileFields};
pub use reference::{Event, Resource};
pub use task::{Task, TaskCounts, TaskPriority, TaskStatus};
