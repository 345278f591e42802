//! Email OTP challenges.
//!
//! Each challenge is a 6-digit code delivered out of band plus an opaque
//! pre-token returned to the client as a correlation handle; validation
//! requires both. Challenges are purpose-scoped so a login code can never
//! complete a password reset.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::store::Store;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OtpPurpose {
    Login,
    PasswordReset,
}

impl OtpPurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login_otp",
            Self::PasswordReset => "password_reset",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct OtpChallenge {
    code: String,
    pre_token: String,
}

fn challenge_key(purpose: OtpPurpose, user_id: Uuid) -> String {
    format!("otp:{}:{user_id}", purpose.as_str())
}

fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

fn generate_pre_token() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate pre-token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[derive(Clone)]
pub struct OtpEngine {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl OtpEngine {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Issue a fresh challenge, replacing any outstanding one for the same
    /// purpose. Returns `(code, pre_token)`; the code goes out by email, the
    /// pre-token travels back to the client.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn issue(
        &self,
        purpose: OtpPurpose,
        user_id: Uuid,
    ) -> Result<(String, String), AuthError> {
        let challenge = OtpChallenge {
            code: generate_code(),
            pre_token: generate_pre_token()?,
        };
        let payload = serde_json::to_string(&challenge).map_err(anyhow::Error::from)?;
        self.store
            .set(&challenge_key(purpose, user_id), &payload, Some(self.ttl))
            .await?;
        Ok((challenge.code, challenge.pre_token))
    }

    /// Validate a code/pre-token pair. Succeeds only when both match; the
    /// record is deleted on success (single use) and left in place on
    /// failure.
    ///
    /// # Errors
    /// `Expired` when no challenge is outstanding (expired or never issued),
    /// `Mismatch` when either value is wrong, `Dependency` on store failure.
    pub async fn validate(
        &self,
        purpose: OtpPurpose,
        user_id: Uuid,
        code: &str,
        pre_token: &str,
    ) -> Result<(), AuthError> {
        let key = challenge_key(purpose, user_id);
        let Some(payload) = self.store.get(&key).await? else {
            return Err(AuthError::Expired("otp challenge"));
        };
        let challenge: OtpChallenge =
            serde_json::from_str(&payload).map_err(anyhow::Error::from)?;

        let code_ok: bool = challenge.code.as_bytes().ct_eq(code.as_bytes()).into();
        let pre_token_ok: bool = challenge
            .pre_token
            .as_bytes()
            .ct_eq(pre_token.as_bytes())
            .into();
        if !(code_ok && pre_token_ok) {
            return Err(AuthError::Mismatch("otp code or pre-token"));
        }

        self.store.delete(&key).await?;
        Ok(())
    }

    /// Discard an outstanding challenge early, e.g. when a TOTP login
    /// supersedes a parallel email OTP.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn invalidate(&self, purpose: OtpPurpose, user_id: Uuid) -> Result<(), AuthError> {
        self.store.delete(&challenge_key(purpose, user_id)).await?;
        Ok(())
    }
}
