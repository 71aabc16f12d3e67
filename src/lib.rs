//! Onboarding Portal: step resolution, route guarding and the JSON API
//! behind a multi-step employee onboarding flow.

pub mod admin;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod onboarding;
pub mod records;
pub mod server;
pub mod session;
pub mod store;
pub mod validation;
