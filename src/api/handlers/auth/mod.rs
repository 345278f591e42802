//! Auth handlers and supporting modules.
//!
//! Endpoints follow the method-selection flow: `POST /v1/auth/login` resolves
//! the account's configured method, second-factor endpoints finish a parked
//! login, and device/TOTP/password-reset endpoints manage account security
//! state. Unknown accounts and failed verifications share generic response
//! bodies so none of them leak whether an address is registered.

pub(crate) mod devices;
pub(crate) mod login;
pub(crate) mod magic_link;
pub(crate) mod password_reset;
pub(crate) mod second_factor;
pub(crate) mod session;
mod state;
pub(crate) mod totp;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState};
