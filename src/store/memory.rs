//! In-memory store used by unit tests and local development.
//!
//! Semantics mirror the Redis implementation: per-key expiry, set-if-absent,
//! and paged scans with a numeric cursor.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::Store;

const SCAN_PAGE_SIZE: usize = 100;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn glob_matches(pattern: &str, key: &str) -> bool {
    // Only `*` wildcards, which is all our key namespaces use.
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().expect("store lock");
        if entries.get(key).is_some_and(Entry::expired) {
            entries.remove(key);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.lock().expect("store lock");
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().expect("store lock");
        if entries.get(key).is_some_and(Entry::expired) {
            entries.remove(key);
        }
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("store lock");
        entries.remove(key);
        Ok(())
    }

    async fn scan(&self, pattern: &str, cursor: u64) -> Result<(u64, Vec<String>)> {
        let mut entries = self.entries.lock().expect("store lock");
        entries.retain(|_, entry| !entry.expired());
        let matching: Vec<String> = entries
            .keys()
            .filter(|key| glob_matches(pattern, key))
            .cloned()
            .collect();

        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(matching.len());
        let end = (start + SCAN_PAGE_SIZE).min(matching.len());
        let next = if end >= matching.len() { 0 } else { end as u64 };
        Ok((next, matching[start..end].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_prefix_and_exact() {
        assert!(glob_matches("otp:login_otp:*", "otp:login_otp:42"));
        assert!(glob_matches("refresh_token:*", "refresh_token:abc"));
        assert!(glob_matches("totp:7", "totp:7"));
        assert!(!glob_matches("otp:login_otp:*", "otp:password_reset:42"));
        assert!(!glob_matches("totp:7", "totp:8"));
    }

    #[tokio::test]
    async fn expired_entries_disappear() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_millis(20)))
            .await
            .expect("set");
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some("v"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.expect("set");
        store.delete("k").await.expect("delete");
        store.delete("k").await.expect("delete");
        assert_eq!(store.get("k").await.expect("get"), None);
    }
}
