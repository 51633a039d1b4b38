//! Redis Client Module
//!
//! [`RemoteClient`] implementation over a Redis connection manager. The
//! manager multiplexes one connection across callers and reconnects after the
//! link drops, so a failed call surfaces `NetworkFailure` and the next call
//! may succeed.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, ErrorKind, RedisError};
use tracing::info;

use crate::cache::{RemoteClient, Value};
use crate::error::{CacheError, Result};

/// Keys requested per SCAN round trip.
const SCAN_BATCH: usize = 256;

/// Keys removed per DEL round trip.
const DELETE_BATCH: usize = 512;

// == Redis Client ==
/// Redis-backed remote client.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379`) and verifies the
    /// link with a PING.
    pub async fn connect(url: &str) -> Result<Self> {
        info!(url, "connecting to redis");
        let client = Client::open(url).map_err(map_redis_error)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(map_redis_error)?;
        let redis = Self { conn };
        redis.ping().await?;
        info!("redis connection established");
        Ok(redis)
    }
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteClient for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(map_redis_error)?;
        Ok(reply.is_some())
    }

    async fn take(&self, key: &str) -> Result<Option<Value>> {
        let mut conn = self.conn.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: usize = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let found: usize = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(found > 0)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once across iterations.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        let mut conn = self.conn.clone();
        let mut removed = 0;
        for chunk in keys.chunks(DELETE_BATCH) {
            let count: usize = redis::cmd("DEL")
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
            removed += count;
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        if pong != "PONG" {
            return Err(CacheError::NetworkFailure(format!(
                "unexpected PING reply: {}",
                pong
            )));
        }
        Ok(())
    }
}

/// Redis rejects `PX 0`; sub-millisecond TTLs round up to one millisecond.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn map_redis_error(err: RedisError) -> CacheError {
    if err.is_timeout() {
        return CacheError::NetworkFailure(format!("redis i/o timeout: {}", err));
    }
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        return CacheError::NetworkFailure(err.to_string());
    }
    match err.kind() {
        ErrorKind::TypeError => CacheError::SerializationFailure(err.to_string()),
        _ => CacheError::NetworkFailure(err.to_string()),
    }
}
