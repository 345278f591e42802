//! # Gatehouse (Authentication & Device Trust)
//!
//! `gatehouse` is the authentication subsystem of a permitting and records
//! back office. It signs users in by their account's configured method
//! (password, magic link, or authenticator app), escalates to a second factor
//! when the device is not trusted, and issues short-lived access tokens
//! paired with rotating refresh tokens.
//!
//! ## Method Selection
//!
//! The login flow per request:
//! `Start -> MethodChosen -> {PasswordPending | MagicLinkSent |
//! TotpOrOtpPending} -> SecondFactorPending? -> SessionIssued | Rejected`.
//! Unknown accounts get the same generic response as a sent magic link, so
//! the endpoint never reveals whether an address is registered.
//!
//! ## Device Trust
//!
//! Browsers are fingerprinted client-side; the server derives a stable
//! device identity from the attributes that survive browser updates and IP
//! changes. Trusted devices skip the email OTP (never the authenticator
//! requirement) and carry a sliding 30-day trust window.
//!
//! ## State
//!
//! All runtime state lives in a TTL'd key-value store (Redis); user
//! credentials come from an internal directory service. A security lockdown
//! flag per user sweeps trusted devices and refresh tokens and blocks new
//! logins until lifted.

pub mod api;
pub mod auth;
pub mod cli;
pub mod directory;
pub mod email;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
