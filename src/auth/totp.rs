//! TOTP enrollment and validation.
//!
//! Per-user state machine: `Unenrolled -> PendingConfirmation -> Enabled`,
//! back to `Unenrolled` via disable. A pending enrollment carries a TTL so
//! abandoned setups clean themselves up; confirmation rewrites the record
//! without expiry. Both pending and enabled secrets validate codes, because
//! confirmation reuses the same check.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::store::Store;

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP_SECONDS: u64 = 30;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TotpEnrollment {
    secret: String,
    enabled: bool,
    created_at: DateTime<Utc>,
}

/// Secret plus provisioning URI handed to the authenticator app during setup.
#[derive(Clone, Debug)]
pub struct TotpProvisioning {
    pub secret_base32: String,
    pub provisioning_uri: String,
}

fn enrollment_key(user_id: Uuid) -> String {
    format!("totp:{user_id}")
}

#[derive(Clone)]
pub struct TotpManager {
    store: Arc<dyn Store>,
    issuer: String,
    pending_ttl: Duration,
}

impl TotpManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, issuer: String, pending_ttl: Duration) -> Self {
        Self {
            store,
            issuer,
            pending_ttl,
        }
    }

    fn build_totp(&self, secret_base32: &str, account: &str) -> Result<TOTP, AuthError> {
        let secret_bytes = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|err| anyhow!("stored totp secret undecodable: {err:?}"))?;
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|err| AuthError::Dependency(anyhow!("totp construction failed: {err}")))
    }

    async fn load(&self, user_id: Uuid) -> Result<Option<TotpEnrollment>, AuthError> {
        let Some(payload) = self.store.get(&enrollment_key(user_id)).await? else {
            return Ok(None);
        };
        let enrollment = serde_json::from_str(&payload).map_err(anyhow::Error::from)?;
        Ok(Some(enrollment))
    }

    /// Start enrollment: generate a secret, store it unconfirmed with a TTL,
    /// and return the secret plus the otpauth provisioning URI.
    ///
    /// # Errors
    /// Returns `Dependency` on secret generation or store failure.
    pub async fn begin_enrollment(
        &self,
        user_id: Uuid,
        account_label: &str,
    ) -> Result<TotpProvisioning, AuthError> {
        let secret_bytes = Secret::generate_secret()
            .to_bytes()
            .map_err(|err| anyhow!("totp secret generation failed: {err:?}"))?;
        let totp = TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account_label.to_string(),
        )
        .map_err(|err| AuthError::Dependency(anyhow!("totp construction failed: {err}")))?;

        let enrollment = TotpEnrollment {
            secret: totp.get_secret_base32(),
            enabled: false,
            created_at: Utc::now(),
        };
        let payload = serde_json::to_string(&enrollment).map_err(anyhow::Error::from)?;
        self.store
            .set(&enrollment_key(user_id), &payload, Some(self.pending_ttl))
            .await?;

        Ok(TotpProvisioning {
            secret_base32: enrollment.secret,
            provisioning_uri: totp.get_url(),
        })
    }

    /// Confirm enrollment with a first valid code. The record is rewritten
    /// enabled and without expiry.
    ///
    /// # Errors
    /// `NotFound` if no enrollment exists, `Mismatch` on a wrong code,
    /// `Dependency` on store failure.
    pub async fn confirm(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        let Some(mut enrollment) = self.load(user_id).await? else {
            return Err(AuthError::NotFound("totp enrollment"));
        };
        let totp = self.build_totp(&enrollment.secret, "confirm")?;
        if !totp.check_current(code).unwrap_or(false) {
            return Err(AuthError::Mismatch("totp code"));
        }

        enrollment.enabled = true;
        let payload = serde_json::to_string(&enrollment).map_err(anyhow::Error::from)?;
        self.store
            .set(&enrollment_key(user_id), &payload, None)
            .await?;
        Ok(())
    }

    /// Check a code against the stored secret, pending or enabled.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn validate(&self, user_id: Uuid, code: &str) -> Result<bool, AuthError> {
        let Some(enrollment) = self.load(user_id).await? else {
            return Ok(false);
        };
        let totp = self.build_totp(&enrollment.secret, "validate")?;
        Ok(totp.check_current(code).unwrap_or(false))
    }

    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn is_enabled(&self, user_id: Uuid) -> Result<bool, AuthError> {
        Ok(self
            .load(user_id)
            .await?
            .is_some_and(|enrollment| enrollment.enabled))
    }

    /// Delete the enrollment outright. The orchestrator re-verifies the
    /// account password before calling this.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn disable(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store.delete(&enrollment_key(user_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manager() -> TotpManager {
        TotpManager::new(
            Arc::new(MemoryStore::new()),
            "gatehouse".to_string(),
            Duration::from_secs(600),
        )
    }

    fn current_code(manager: &TotpManager, provisioning: &TotpProvisioning) -> String {
        manager
            .build_totp(&provisioning.secret_base32, "test")
            .expect("totp")
            .generate_current()
            .expect("code")
    }

    #[tokio::test]
    async fn enrollment_confirms_and_enables() {
        let manager = manager();
        let user_id = Uuid::new_v4();

        assert!(!manager.is_enabled(user_id).await.expect("status"));

        let provisioning = manager
            .begin_enrollment(user_id, "clerk@example.com")
            .await
            .expect("begin");
        assert!(provisioning.provisioning_uri.starts_with("otpauth://totp/"));
        assert!(!manager.is_enabled(user_id).await.expect("status"));

        let code = current_code(&manager, &provisioning);
        manager.confirm(user_id, &code).await.expect("confirm");
        assert!(manager.is_enabled(user_id).await.expect("status"));
    }

    #[tokio::test]
    async fn pending_secret_validates_codes() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let provisioning = manager
            .begin_enrollment(user_id, "clerk@example.com")
            .await
            .expect("begin");

        let code = current_code(&manager, &provisioning);
        assert!(manager.validate(user_id, &code).await.expect("validate"));
        assert!(!manager.validate(user_id, "000000").await.expect("validate")
            || code == "000000");
    }

    #[tokio::test]
    async fn confirm_rejects_wrong_code() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let provisioning = manager
            .begin_enrollment(user_id, "clerk@example.com")
            .await
            .expect("begin");
        let code = current_code(&manager, &provisioning);
        let wrong = if code == "123456" { "654321" } else { "123456" };

        let result = manager.confirm(user_id, wrong).await;
        assert!(matches!(result, Err(AuthError::Mismatch(_))));
        assert!(!manager.is_enabled(user_id).await.expect("status"));
    }

    #[tokio::test]
    async fn disable_returns_to_unenrolled() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let provisioning = manager
            .begin_enrollment(user_id, "clerk@example.com")
            .await
            .expect("begin");
        let code = current_code(&manager, &provisioning);
        manager.confirm(user_id, &code).await.expect("confirm");

        manager.disable(user_id).await.expect("disable");
        assert!(!manager.is_enabled(user_id).await.expect("status"));
        assert!(!manager.validate(user_id, &code).await.expect("validate"));
    }

    #[tokio::test]
    async fn validate_without_enrollment_is_false() {
        let manager = manager();
        assert!(!manager
            .validate(Uuid::new_v4(), "123456")
            .await
            .expect("validate"));
    }
}
