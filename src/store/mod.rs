//! Persistence layer: libSQL-backed storage for onboarding records.

pub mod libsql_backend;
pub mod migrations;
pub mod notify;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use notify::{NotifyingStore, RecordChange, RecordKind};
pub use traits::{RecordStore, StatusUpdate};
