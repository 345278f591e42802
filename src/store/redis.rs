//! Redis-backed implementation of the ephemeral store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;

use super::Store;

/// How many keys a single SCAN page asks for. Small enough that a user with
/// many devices or sessions never blocks other traffic on one round trip.
const SCAN_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis. The connection manager reconnects on its own, so a
    /// clone of this store is cheap and safe to share across requests.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the initial connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.context("redis GET failed")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let mut cmd = redis::cmd("SET");
                cmd.arg(key).arg(value).arg("EX").arg(ttl.as_secs().max(1));
                let _: () = cmd
                    .query_async(&mut conn)
                    .await
                    .context("redis SET EX failed")?;
            }
            None => {
                let _: () = conn.set(key, value).await.context("redis SET failed")?;
            }
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1));
        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .context("redis SET NX failed")?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.context("redis DEL failed")?;
        Ok(())
    }

    async fn scan(&self, pattern: &str, cursor: u64) -> Result<(u64, Vec<String>)> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_PAGE_SIZE);
        let page: (u64, Vec<String>) = cmd
            .query_async(&mut conn)
            .await
            .context("redis SCAN failed")?;
        Ok(page)
    }
}
