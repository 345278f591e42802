//! Account lockdown.
//!
//! A lockdown flag freezes trust and sessions for a user: every trust check
//! fails closed while it exists, all trusted devices are removed, and all
//! refresh tokens are revoked. Only an explicit administrative unlock clears
//! the flag. Lock and unlock both leave an audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use ulid::Ulid;
use uuid::Uuid;

use crate::auth::device::DeviceTrustStore;
use crate::auth::error::AuthError;
use crate::auth::tokens::SessionTokenManager;
use crate::store::Store;

const AUDIT_RETENTION: Duration = Duration::from_secs(30 * 24 * 3600);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockdownFlag {
    pub reason: String,
    pub locked_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub user_id: Uuid,
    pub event: String,
    pub at: DateTime<Utc>,
    pub detail: serde_json::Value,
}

pub(crate) fn flag_key(user_id: Uuid) -> String {
    format!("security_lockdown:{user_id}")
}

fn audit_key(user_id: Uuid) -> String {
    format!("audit:{user_id}:{}", Ulid::new())
}

/// Read by every trust and session check; a store failure here propagates
/// rather than defaulting open.
pub(crate) async fn is_locked(store: &dyn Store, user_id: Uuid) -> Result<bool, AuthError> {
    Ok(store.get(&flag_key(user_id)).await?.is_some())
}

#[derive(Clone)]
pub struct LockdownManager {
    store: Arc<dyn Store>,
    trust: DeviceTrustStore,
    tokens: SessionTokenManager,
}

impl LockdownManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, trust: DeviceTrustStore, tokens: SessionTokenManager) -> Self {
        Self {
            store,
            trust,
            tokens,
        }
    }

    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn is_locked(&self, user_id: Uuid) -> Result<bool, AuthError> {
        is_locked(self.store.as_ref(), user_id).await
    }

    /// Freeze the account: write the flag first so concurrent trust checks
    /// fail closed while devices and sessions are being swept.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn lock(&self, user_id: Uuid, reason: &str) -> Result<(), AuthError> {
        let flag = LockdownFlag {
            reason: reason.to_string(),
            locked_at: Utc::now(),
        };
        let payload = serde_json::to_string(&flag).map_err(anyhow::Error::from)?;
        self.store.set(&flag_key(user_id), &payload, None).await?;

        self.trust.remove_all(user_id).await?;
        let revoked = self.tokens.revoke_all_for_user(user_id).await?;

        warn!(%user_id, reason, revoked, "account locked down");
        self.audit(
            user_id,
            "security_lockdown",
            json!({ "reason": reason, "sessions_revoked": revoked }),
        )
        .await?;
        Ok(())
    }

    /// Administrative unlock; trust and sessions are rebuilt organically.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn unlock(&self, user_id: Uuid, admin_id: Uuid) -> Result<(), AuthError> {
        self.store.delete(&flag_key(user_id)).await?;
        self.audit(
            user_id,
            "security_unlock",
            json!({ "admin_id": admin_id.to_string() }),
        )
        .await?;
        Ok(())
    }

    async fn audit(
        &self,
        user_id: Uuid,
        event: &str,
        detail: serde_json::Value,
    ) -> Result<(), AuthError> {
        let record = AuditEvent {
            user_id,
            event: event.to_string(),
            at: Utc::now(),
            detail,
        };
        let payload = serde_json::to_string(&record).map_err(anyhow::Error::from)?;
        self.store
            .set(&audit_key(user_id), &payload, Some(AUDIT_RETENTION))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fingerprint::DeviceFingerprint;
    use crate::store::{scan_all, MemoryStore};
    use secrecy::SecretString;

    fn fingerprint() -> DeviceFingerprint {
        DeviceFingerprint {
            user_agent: "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0.0.0 Safari/537.36".to_string(),
            screen_resolution: "1920x1080".to_string(),
            cookie_enabled: true,
            ..DeviceFingerprint::default()
        }
    }

    fn services(store: Arc<MemoryStore>) -> (DeviceTrustStore, SessionTokenManager, LockdownManager) {
        let trust = DeviceTrustStore::new(store.clone(), Duration::from_secs(3600));
        let tokens = SessionTokenManager::new(
            store.clone(),
            SecretString::from("test-secret".to_string()),
            Duration::from_secs(900),
            Duration::from_secs(3600),
        );
        let lockdown = LockdownManager::new(store, trust.clone(), tokens.clone());
        (trust, tokens, lockdown)
    }

    #[tokio::test]
    async fn lock_sweeps_trust_and_sessions() {
        let store = Arc::new(MemoryStore::new());
        let (trust, tokens, lockdown) = services(store.clone());
        let user_id = Uuid::new_v4();

        trust.register(user_id, &fingerprint()).await.expect("register");
        let pair = tokens.issue_pair(user_id).await.expect("issue");

        lockdown.lock(user_id, "suspicious activity").await.expect("lock");

        assert!(matches!(
            trust.is_trusted(user_id, &fingerprint()).await,
            Err(AuthError::Locked)
        ));
        assert!(trust.list(user_id).await.expect("list").is_empty());
        assert!(matches!(
            tokens.rotate(&pair.refresh_token).await,
            Err(AuthError::NotFound(_))
        ));

        let audit = scan_all(store.as_ref(), &format!("audit:{user_id}:*"))
            .await
            .expect("scan");
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn unlock_restores_trust_checks() {
        let store = Arc::new(MemoryStore::new());
        let (trust, _, lockdown) = services(store.clone());
        let user_id = Uuid::new_v4();

        lockdown.lock(user_id, "report of stolen laptop").await.expect("lock");
        assert!(lockdown.is_locked(user_id).await.expect("flag"));

        lockdown.unlock(user_id, Uuid::new_v4()).await.expect("unlock");
        assert!(!lockdown.is_locked(user_id).await.expect("flag"));

        let (trusted, _) = trust
            .is_trusted(user_id, &fingerprint())
            .await
            .expect("trust check runs again");
        assert!(!trusted);

        let audit = scan_all(store.as_ref(), &format!("audit:{user_id}:*"))
            .await
            .expect("scan");
        assert_eq!(audit.len(), 2);
    }
}
