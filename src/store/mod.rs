//! Ephemeral key-value store used for all auth state.
//!
//! Every record this service owns (trusted devices, OTP challenges, TOTP
//! enrollments, magic-link tickets, refresh-token records, lockdown flags,
//! audit events) lives behind this trait, keyed by a namespaced string with
//! an optional TTL. The production implementation is Redis; unit tests use
//! the in-memory implementation.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a value, with an optional expiry. `None` means the key persists
    /// until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Atomic set-if-absent with expiry. Returns `true` when the key was
    /// created, `false` when it already existed.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// One page of a cursor-based scan for keys matching `pattern`
    /// (glob-style, `*` wildcard). A returned cursor of 0 means the
    /// iteration is complete.
    async fn scan(&self, pattern: &str, cursor: u64) -> Result<(u64, Vec<String>)>;
}

/// Drive a cursor-based scan to completion.
///
/// Listings never issue a single unbounded call; large namespaces are walked
/// page by page so they cannot monopolize a connection.
pub async fn scan_all(store: &dyn Store, pattern: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut cursor = 0;
    loop {
        let (next, page) = store.scan(pattern, cursor).await?;
        keys.extend(page);
        if next == 0 {
            break;
        }
        cursor = next;
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::{scan_all, MemoryStore, Store};
    use std::time::Duration;

    #[tokio::test]
    async fn scan_all_walks_every_page() {
        let store = MemoryStore::new();
        for i in 0..250 {
            store
                .set(&format!("probe:{i}"), "x", None)
                .await
                .expect("set");
        }
        store.set("other:1", "y", None).await.expect("set");

        let keys = scan_all(&store, "probe:*").await.expect("scan");
        assert_eq!(keys.len(), 250);
        assert!(keys.iter().all(|key| key.starts_with("probe:")));
    }

    #[tokio::test]
    async fn set_if_absent_is_single_winner() {
        let store = MemoryStore::new();
        let first = store
            .set_if_absent("lock:report", "a", Duration::from_secs(5))
            .await
            .expect("set_if_absent");
        let second = store
            .set_if_absent("lock:report", "b", Duration::from_secs(5))
            .await
            .expect("set_if_absent");
        assert!(first);
        assert!(!second);
        assert_eq!(
            store.get("lock:report").await.expect("get").as_deref(),
            Some("a")
        );
    }
}
