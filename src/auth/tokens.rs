//! Access/refresh token pairs and single-use refresh rotation.
//!
//! Both tokens are HS256 JWTs. The refresh token is additionally recorded in
//! the store under `refresh_token:<token>` mapped to its owner; rotation
//! deletes that record before minting a replacement, so a stolen refresh
//! token is worth at most one use.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use ulid::Ulid;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::store::{scan_all, Store};

const KIND_ACCESS: &str = "access";
const KIND_REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    kind: String,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

fn record_key(token: &str) -> String {
    format!("refresh_token:{token}")
}

/// Shown in logs instead of the full token.
fn token_prefix(token: &str) -> &str {
    &token[..token.len().min(12)]
}

#[derive(Clone)]
pub struct SessionTokenManager {
    store: Arc<dyn Store>,
    secret: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionTokenManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        secret: SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            store,
            secret,
            access_ttl,
            refresh_ttl,
        }
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn encode_token(
        &self,
        user_id: Uuid,
        kind: &str,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).map_err(anyhow::Error::from)?;
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            kind: kind.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Ulid::new().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .map_err(anyhow::Error::from)?;
        Ok((token, expires_at))
    }

    fn decode_token(&self, token: &str, expected_kind: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired("token"),
            _ => AuthError::Mismatch("token signature"),
        })?;
        if data.claims.kind != expected_kind {
            return Err(AuthError::Mismatch("token kind"));
        }
        Ok(data.claims)
    }

    /// Verify an access token and return its owner.
    ///
    /// # Errors
    /// `Expired` past its lifetime, `Mismatch` on any other decode failure.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = self.decode_token(token, KIND_ACCESS)?;
        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Mismatch("token subject"))
    }

    /// Mint an access/refresh pair with the configured access lifetime.
    ///
    /// # Errors
    /// Returns `Dependency` on store failure.
    pub async fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        self.issue_pair_with_access_ttl(user_id, self.access_ttl)
            .await
    }

    /// Mint a pair with an explicit access lifetime. The magic-link path
    /// issues longer-lived access tokens than password login.
    ///
    /// # Errors
    /// Returns `Dependency` on store failure.
    pub async fn issue_pair_with_access_ttl(
        &self,
        user_id: Uuid,
        access_ttl: Duration,
    ) -> Result<TokenPair, AuthError> {
        let (access_token, access_expires_at) =
            self.encode_token(user_id, KIND_ACCESS, access_ttl)?;
        let (refresh_token, refresh_expires_at) =
            self.encode_token(user_id, KIND_REFRESH, self.refresh_ttl)?;
        self.store
            .set(
                &record_key(&refresh_token),
                &user_id.to_string(),
                Some(self.refresh_ttl),
            )
            .await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Single-use refresh rotation.
    ///
    /// Two concurrent rotations of the same token can both pass the lookup
    /// before either deletes the record; that race is accepted, and the
    /// loser's pair simply expires on its own schedule.
    ///
    /// # Errors
    /// `Expired`/`Mismatch` on a bad token, `NotFound` when the record is
    /// gone (already rotated or revoked), `Mismatch` when the record's owner
    /// differs from the token's subject, `Dependency` on store failure.
    pub async fn rotate(&self, old_refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.decode_token(old_refresh_token, KIND_REFRESH)?;
        let key = record_key(old_refresh_token);

        let Some(stored_user) = self.store.get(&key).await? else {
            return Err(AuthError::NotFound("refresh token record"));
        };
        if stored_user != claims.sub {
            error!(
                token_prefix = token_prefix(old_refresh_token),
                "refresh token owner mismatch"
            );
            return Err(AuthError::Mismatch("refresh token owner"));
        }

        // Best-effort cleanup: the new pair is issued even if the delete
        // fails, and the stale record ages out with its TTL.
        if let Err(err) = self.store.delete(&key).await {
            error!(
                token_prefix = token_prefix(old_refresh_token),
                error = %err,
                "failed to delete rotated refresh token record"
            );
        }

        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Mismatch("token subject"))?;
        self.issue_pair(user_id).await
    }

    /// Logout: drop the refresh record. Idempotent.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.store.delete(&record_key(refresh_token)).await?;
        Ok(())
    }

    /// Revoke every refresh record owned by the user. Used by lockdown and
    /// administrative session termination.
    ///
    /// # Errors
    /// Returns `Dependency` if the store is unreachable.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<usize, AuthError> {
        let user = user_id.to_string();
        let keys = scan_all(self.store.as_ref(), "refresh_token:*").await?;
        let mut revoked = 0;
        for key in keys {
            if self.store.get(&key).await?.as_deref() == Some(user.as_str()) {
                self.store.delete(&key).await?;
                revoked += 1;
            }
        }
        info!(%user_id, revoked, "revoked refresh tokens for user");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manager(store: Arc<MemoryStore>) -> SessionTokenManager {
        SessionTokenManager::new(
            store,
            SecretString::from("test-secret".to_string()),
            Duration::from_secs(900),
            Duration::from_secs(7 * 24 * 3600),
        )
    }

    #[tokio::test]
    async fn issue_and_verify_access() {
        let manager = manager(Arc::new(MemoryStore::new()));
        let user_id = Uuid::new_v4();
        let pair = manager.issue_pair(user_id).await.expect("issue");

        assert_eq!(manager.verify_access(&pair.access_token).expect("verify"), user_id);
        // A refresh token is not an access token.
        assert!(matches!(
            manager.verify_access(&pair.refresh_token),
            Err(AuthError::Mismatch(_))
        ));
    }

    #[tokio::test]
    async fn rotation_is_single_use() {
        let manager = manager(Arc::new(MemoryStore::new()));
        let user_id = Uuid::new_v4();
        let pair = manager.issue_pair(user_id).await.expect("issue");

        let rotated = manager.rotate(&pair.refresh_token).await.expect("rotate");
        let replay = manager.rotate(&pair.refresh_token).await;
        assert!(matches!(replay, Err(AuthError::NotFound(_))));

        // The freshly minted token rotates fine.
        manager
            .rotate(&rotated.refresh_token)
            .await
            .expect("rotate new token");
    }

    #[tokio::test]
    async fn rotation_rejects_owner_mismatch() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone());
        let pair = manager.issue_pair(Uuid::new_v4()).await.expect("issue");

        // Simulate a poisoned record pointing at another user.
        store
            .set(
                &format!("refresh_token:{}", pair.refresh_token),
                &Uuid::new_v4().to_string(),
                None,
            )
            .await
            .expect("poison");

        let result = manager.rotate(&pair.refresh_token).await;
        assert!(matches!(result, Err(AuthError::Mismatch(_))));
    }

    #[tokio::test]
    async fn expired_refresh_token_rejected() {
        let manager = manager(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            kind: KIND_REFRESH.to_string(),
            iat: (now - ChronoDuration::days(8)).timestamp(),
            exp: (now - ChronoDuration::days(1)).timestamp(),
            jti: Ulid::new().to_string(),
        };
        let stale = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode");

        let result = manager.rotate(&stale).await;
        assert!(matches!(result, Err(AuthError::Expired(_))));
    }

    #[tokio::test]
    async fn revoke_all_only_touches_owner() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let alice_pair_a = manager.issue_pair(alice).await.expect("issue");
        let alice_pair_b = manager.issue_pair(alice).await.expect("issue");
        let bob_pair = manager.issue_pair(bob).await.expect("issue");

        let revoked = manager.revoke_all_for_user(alice).await.expect("revoke_all");
        assert_eq!(revoked, 2);

        assert!(matches!(
            manager.rotate(&alice_pair_a.refresh_token).await,
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(
            manager.rotate(&alice_pair_b.refresh_token).await,
            Err(AuthError::NotFound(_))
        ));
        manager
            .rotate(&bob_pair.refresh_token)
            .await
            .expect("bob unaffected");
    }

    #[tokio::test]
    async fn logout_revokes_record() {
        let manager = manager(Arc::new(MemoryStore::new()));
        let pair = manager.issue_pair(Uuid::new_v4()).await.expect("issue");

        manager.revoke(&pair.refresh_token).await.expect("revoke");
        assert!(matches!(
            manager.rotate(&pair.refresh_token).await,
            Err(AuthError::NotFound(_))
        ));
    }
}
