//! Authentication domain: credential verification, device trust, second
//! factors, magic links, session tokens, and the orchestrator tying them
//! together.

pub mod device;
pub mod error;
pub mod fingerprint;
pub mod lockdown;
pub mod magic_link;
pub mod orchestrator;
pub mod otp;
pub mod password;
pub mod tokens;
pub mod totp;

pub use error::AuthError;
pub use orchestrator::{LoginOutcome, Orchestrator, SessionBundle};
