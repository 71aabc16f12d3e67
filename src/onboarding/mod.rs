//! Onboarding flow: step resolution, route guarding and the user-facing
//! onboarding endpoints.
//!
//! A user moves through agreement, profile, documents and application
//! tracking. The current step is always recomputed from stored records,
//! never stored itself, and the guard uses it to gate navigation.

pub mod guard;
pub mod routes;
pub mod step;

pub use guard::{
    AccessRequest, Decision, RouteAccess, RouteCheck, SessionView, check_access, guard_path,
    route_access,
};
pub use routes::onboarding_routes;
pub use step::{OnboardingRecords, Resolution, Step, resolve_for_user, resolve_step};
