//! Sessions: caller identity, the per-user resolved onboarding step, and
//! the registry that owns live sessions.
//!
//! The registry is created in `main` and shared through the HTTP state.
//! Sessions are opened on a user's first request and torn down on sign-out.

pub mod context;
pub mod identity;
pub mod registry;
pub mod routes;

pub use context::{SessionContext, SessionState};
pub use identity::Identity;
pub use registry::{SessionRegistry, spawn_change_listener, spawn_idle_pruner};
pub use routes::{SessionMessage, session_routes};
