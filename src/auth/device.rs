//! Trusted-device records.
//!
//! A device becomes trusted on first successful registration and stays
//! trusted while it keeps being used; every positive trust check refreshes
//! the record's last-used timestamp and re-applies the TTL. Lockdown always
//! wins over trust.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::fingerprint::{device_identity, device_label, DeviceFingerprint};
use crate::auth::lockdown;
use crate::store::{scan_all, Store};

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TrustedDevice {
    pub device_id: String,
    pub user_id: Uuid,
    pub label: String,
    pub fingerprint: DeviceFingerprint,
    pub registered_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub active: bool,
}

fn device_key(user_id: Uuid, device_id: &str) -> String {
    format!("trusted_device:{user_id}:{device_id}")
}

fn user_pattern(user_id: Uuid) -> String {
    format!("trusted_device:{user_id}:*")
}

#[derive(Clone)]
pub struct DeviceTrustStore {
    store: Arc<dyn Store>,
    trust_ttl: Duration,
}

impl DeviceTrustStore {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, trust_ttl: Duration) -> Self {
        Self { store, trust_ttl }
    }

    /// Register the device presented by `fingerprint` as trusted for the user.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn register(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
    ) -> Result<TrustedDevice, AuthError> {
        let now = Utc::now();
        let device = TrustedDevice {
            device_id: device_identity(fingerprint),
            user_id,
            label: device_label(fingerprint),
            fingerprint: fingerprint.clone(),
            registered_at: now,
            last_used_at: now,
            active: true,
        };
        let payload = serde_json::to_string(&device).map_err(anyhow::Error::from)?;
        self.store
            .set(
                &device_key(user_id, &device.device_id),
                &payload,
                Some(self.trust_ttl),
            )
            .await?;
        Ok(device)
    }

    /// Check whether the presenting device is trusted.
    ///
    /// Fails closed with `Locked` when a lockdown flag exists, regardless of
    /// any trust record. A missing record is an untrusted device, not an
    /// error. On a hit, the last-used timestamp is refreshed and the TTL
    /// re-applied.
    ///
    /// # Errors
    /// Returns `Locked` for a locked account, `Dependency` on store failure.
    pub async fn is_trusted(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
    ) -> Result<(bool, Option<TrustedDevice>), AuthError> {
        if lockdown::is_locked(self.store.as_ref(), user_id).await? {
            return Err(AuthError::Locked);
        }

        let device_id = device_identity(fingerprint);
        let key = device_key(user_id, &device_id);
        let Some(payload) = self.store.get(&key).await? else {
            return Ok((false, None));
        };
        let mut device: TrustedDevice =
            serde_json::from_str(&payload).map_err(anyhow::Error::from)?;

        device.last_used_at = Utc::now();
        let refreshed = serde_json::to_string(&device).map_err(anyhow::Error::from)?;
        self.store
            .set(&key, &refreshed, Some(self.trust_ttl))
            .await?;

        Ok((device.active, Some(device)))
    }

    /// List the user's trusted devices via a paged key scan. Corrupt entries
    /// are skipped with a warning, never fatal.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<TrustedDevice>, AuthError> {
        let keys = scan_all(self.store.as_ref(), &user_pattern(user_id)).await?;
        let mut devices = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(payload) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<TrustedDevice>(&payload) {
                Ok(device) => devices.push(device),
                Err(err) => {
                    warn!(%key, error = %err, "skipping undecodable trusted device record");
                }
            }
        }
        Ok(devices)
    }

    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn remove(&self, user_id: Uuid, device_id: &str) -> Result<(), AuthError> {
        self.store.delete(&device_key(user_id, device_id)).await?;
        Ok(())
    }

    /// Remove every trusted device for the user. Used by explicit revocation
    /// and by lockdown.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn remove_all(&self, user_id: Uuid) -> Result<(), AuthError> {
        let keys = scan_all(self.store.as_ref(), &user_pattern(user_id)).await?;
        for key in keys {
            self.store.delete(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn fingerprint() -> DeviceFingerprint {
        DeviceFingerprint {
            user_agent: "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0.0.0 Safari/537.36".to_string(),
            screen_resolution: "1920x1080".to_string(),
            timezone: "Africa/Harare".to_string(),
            language: "en-ZW".to_string(),
            platform: "Win32".to_string(),
            cookie_enabled: true,
            canvas_hash: "canvas-a".to_string(),
            webgl_hash: "webgl-a".to_string(),
            ..DeviceFingerprint::default()
        }
    }

    fn trust_store() -> (Arc<MemoryStore>, DeviceTrustStore) {
        let store = Arc::new(MemoryStore::new());
        let trust = DeviceTrustStore::new(store.clone(), Duration::from_secs(3600));
        (store, trust)
    }

    #[tokio::test]
    async fn register_then_trusted() {
        let (_, trust) = trust_store();
        let user_id = Uuid::new_v4();

        let (trusted, _) = trust
            .is_trusted(user_id, &fingerprint())
            .await
            .expect("check");
        assert!(!trusted);

        let device = trust
            .register(user_id, &fingerprint())
            .await
            .expect("register");
        assert_eq!(device.label, "Chrome on Windows");

        let (trusted, hit) = trust
            .is_trusted(user_id, &fingerprint())
            .await
            .expect("check");
        assert!(trusted);
        assert_eq!(hit.map(|d| d.device_id), Some(device.device_id));
    }

    #[tokio::test]
    async fn lockdown_fails_closed() {
        let (store, trust) = trust_store();
        let user_id = Uuid::new_v4();
        trust
            .register(user_id, &fingerprint())
            .await
            .expect("register");

        store
            .set(
                &format!("security_lockdown:{user_id}"),
                "{\"reason\":\"suspicious\"}",
                None,
            )
            .await
            .expect("set flag");

        let result = trust.is_trusted(user_id, &fingerprint()).await;
        assert!(matches!(result, Err(AuthError::Locked)));
    }

    #[tokio::test]
    async fn list_skips_corrupt_entries() {
        let (store, trust) = trust_store();
        let user_id = Uuid::new_v4();
        trust
            .register(user_id, &fingerprint())
            .await
            .expect("register");
        store
            .set(&format!("trusted_device:{user_id}:garbage"), "not json", None)
            .await
            .expect("set");

        let devices = trust.list(user_id).await.expect("list");
        assert_eq!(devices.len(), 1);
    }

    #[tokio::test]
    async fn remove_all_clears_namespace() {
        let (_, trust) = trust_store();
        let user_id = Uuid::new_v4();
        trust
            .register(user_id, &fingerprint())
            .await
            .expect("register");
        let mut other = fingerprint();
        other.screen_resolution = "2560x1440".to_string();
        trust.register(user_id, &other).await.expect("register");

        trust.remove_all(user_id).await.expect("remove_all");
        assert!(trust.list(user_id).await.expect("list").is_empty());
    }
}
