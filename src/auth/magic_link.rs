//! Single-use, device-bound magic links.
//!
//! A ticket records the fingerprint seen at issuance. Redemption tolerates
//! minor environment drift between issuance and redemption by requiring a
//! similarity ratio over the compared attributes instead of an exact match.
//! A redeemed ticket is re-written with `used = true` rather than deleted,
//! so a replay observes "already used" instead of "not found".

use anyhow::Context;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::fingerprint::{similarity, DeviceFingerprint};
use crate::store::Store;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MagicLinkTicket {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub fingerprint: DeviceFingerprint,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

#[derive(Clone, Debug)]
pub struct IssuedMagicLink {
    pub token: String,
    pub redeem_url: String,
    pub expires_at: DateTime<Utc>,
}

fn ticket_key(token: &str) -> String {
    format!("magic_link:{token}")
}

fn generate_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate magic link token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[derive(Clone)]
pub struct MagicLinkService {
    store: Arc<dyn Store>,
    base_url: String,
    ttl: Duration,
    similarity_threshold: f64,
}

impl MagicLinkService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        base_url: &str,
        ttl: Duration,
        similarity_threshold: f64,
    ) -> Self {
        Self {
            store,
            base_url: base_url.trim_end_matches('/').to_string(),
            ttl,
            similarity_threshold,
        }
    }

    /// Issue a link bound to the requesting device.
    ///
    /// # Errors
    /// Returns `Dependency` on randomness or store failure.
    pub async fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Result<IssuedMagicLink, AuthError> {
        let token = generate_token()?;
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.ttl).map_err(anyhow::Error::from)?;
        let ticket = MagicLinkTicket {
            token: token.clone(),
            user_id,
            email: email.to_string(),
            fingerprint: fingerprint.clone(),
            created_at: now,
            expires_at: now + ttl,
            used: false,
        };
        let payload = serde_json::to_string(&ticket).map_err(anyhow::Error::from)?;
        self.store
            .set(&ticket_key(&token), &payload, Some(self.ttl))
            .await?;

        Ok(IssuedMagicLink {
            redeem_url: format!("{}/auth/magiclink#token={token}", self.base_url),
            expires_at: ticket.expires_at,
            token,
        })
    }

    /// Redeem a link from the presenting device.
    ///
    /// # Errors
    /// `NotFound` for an unknown token, `AlreadyUsed` on replay, `Expired`
    /// past the deadline (the ticket is proactively deleted), `Mismatch`
    /// when the device similarity falls below the threshold, `Dependency`
    /// on store failure.
    pub async fn redeem(
        &self,
        token: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Result<(MagicLinkTicket, String), AuthError> {
        let key = ticket_key(token);
        let Some(payload) = self.store.get(&key).await? else {
            return Err(AuthError::NotFound("magic link ticket"));
        };
        let mut ticket: MagicLinkTicket =
            serde_json::from_str(&payload).map_err(anyhow::Error::from)?;

        if ticket.used {
            return Err(AuthError::AlreadyUsed("magic link ticket"));
        }
        let now = Utc::now();
        if now > ticket.expires_at {
            self.store.delete(&key).await?;
            return Err(AuthError::Expired("magic link ticket"));
        }

        let score = similarity(&ticket.fingerprint, fingerprint);
        if score < self.similarity_threshold {
            info!(
                user_id = %ticket.user_id,
                score,
                threshold = self.similarity_threshold,
                "magic link rejected: device similarity below threshold"
            );
            return Err(AuthError::Mismatch("device fingerprint"));
        }

        // Mark used immediately, keeping the record alive for its remaining
        // lifetime so replays are observable as such.
        ticket.used = true;
        let remaining = (ticket.expires_at - now)
            .to_std()
            .unwrap_or(Duration::from_secs(1));
        let rewritten = serde_json::to_string(&ticket).map_err(anyhow::Error::from)?;
        self.store.set(&key, &rewritten, Some(remaining)).await?;

        let redirect_url = format!("{}/dashboard", self.base_url);
        Ok((ticket, redirect_url))
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
            plugins: "pdf-viewer".to_string(),
            canvas_hash: "canvas-a".to_string(),
            webgl_hash: "webgl-a".to_string(),
            ..DeviceFingerprint::default()
        }
    }

    fn service(store: Arc<MemoryStore>) -> MagicLinkService {
        MagicLinkService::new(store, "https://backoffice.example", Duration::from_secs(900), 0.7)
    }

    #[tokio::test]
    async fn issue_and_redeem_same_device() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);
        let user_id = Uuid::new_v4();

        let issued = service
            .issue(user_id, "clerk@example.com", &fingerprint())
            .await
            .expect("issue");
        assert!(issued.redeem_url.contains(&issued.token));

        let (ticket, redirect) = service
            .redeem(&issued.token, &fingerprint())
            .await
            .expect("redeem");
        assert_eq!(ticket.user_id, user_id);
        assert!(ticket.used);
        assert_eq!(redirect, "https://backoffice.example/dashboard");
    }

    #[tokio::test]
    async fn replay_observes_already_used() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);
        let issued = service
            .issue(Uuid::new_v4(), "clerk@example.com", &fingerprint())
            .await
            .expect("issue");

        service
            .redeem(&issued.token, &fingerprint())
            .await
            .expect("first redemption");
        let replay = service.redeem(&issued.token, &fingerprint()).await;
        assert!(matches!(replay, Err(AuthError::AlreadyUsed(_))));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);
        let result = service.redeem("no-such-token", &fingerprint()).await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn expired_ticket_rejected_and_deleted() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let now = Utc::now();
        let ticket = MagicLinkTicket {
            token: "expired-token".to_string(),
            user_id: Uuid::new_v4(),
            email: "clerk@example.com".to_string(),
            fingerprint: fingerprint(),
            created_at: now - ChronoDuration::minutes(16),
            expires_at: now - ChronoDuration::minutes(1),
            used: false,
        };
        store
            .set(
                "magic_link:expired-token",
                &serde_json::to_string(&ticket).expect("serialize"),
                None,
            )
            .await
            .expect("seed");

        let result = service.redeem("expired-token", &fingerprint()).await;
        assert!(matches!(result, Err(AuthError::Expired(_))));

        let after = service.redeem("expired-token", &fingerprint()).await;
        assert!(matches!(after, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn similarity_threshold_enforced() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);
        let issued = service
            .issue(Uuid::new_v4(), "clerk@example.com", &fingerprint())
            .await
            .expect("issue");

        // Two drifted attributes out of nine still passes.
        let mut drifted = fingerprint();
        drifted.plugins = "pdf-viewer,widevine".to_string();
        drifted.canvas_hash = "canvas-b".to_string();
        service
            .redeem(&issued.token, &drifted)
            .await
            .expect("drifted device accepted");

        let issued = service
            .issue(Uuid::new_v4(), "clerk@example.com", &fingerprint())
            .await
            .expect("issue");
        let mut foreign = fingerprint();
        foreign.plugins = String::new();
        foreign.canvas_hash = "canvas-x".to_string();
        foreign.timezone = "Europe/London".to_string();
        let result = service.redeem(&issued.token, &foreign).await;
        assert!(matches!(result, Err(AuthError::Mismatch(_))));
    }
}
