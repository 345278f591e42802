//! API handlers.

pub(crate) mod auth;
pub(crate) mod health;

pub use auth::{AuthConfig, AuthState};
