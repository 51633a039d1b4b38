//! Remote Backend Module
//!
//! Backend that delegates storage, TTL and eviction to an external key/value
//! service reached through a [`RemoteClient`]. The cache layer owns no data
//! here, only the mapping from `(region, key)` to the service's native key.
//!
//! Native keys are `{prefix}:{len}:{region}:{key}` where `len` is the byte
//! length of the region name, so region `a` with key `b:k` and region `a:b`
//! with key `k` never share a native key or a SCAN pattern.
//!
//! ## Capabilities
//! - Single-key operations are atomic through service primitives: SET,
//!   SET NX (`setdefault`), GETDEL (`pop`) and DEL.
//! - `len`, `keys`, `values`, `items` and `popitem` enumerate with SCAN. They
//!   are approximate while other clients write to the same region.
//! - `clear` deletes in SCAN batches, so a `set` racing it may survive.
//! - Every call runs under the configured operation deadline. A call that
//!   times out surfaces `BackendTimeout` and is never retried; a timed-out
//!   write may or may not have reached the service (at-most-once).
//! - Hit and miss counters are process-wide, not per region.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::{Backend, BackendKind, CacheStats, Region, Snapshot, Value};
use crate::error::{CacheError, Result};

/// Default prefix for native keys.
pub const DEFAULT_KEY_PREFIX: &str = "regioncache";

/// Default per-operation deadline.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Attempts `setdefault` makes when the existing value vanishes between
/// the failed SET NX and the follow-up GET.
const SETDEFAULT_ATTEMPTS: usize = 3;

// == Remote Client ==
/// The small protocol a remote key/value service must satisfy.
///
/// Keys passed here are already native keys. Patterns follow glob syntax
/// with `*` as the only wildcard the backend relies on.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Unconditional write. `ttl` is never zero.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Writes only if the key is absent. Returns true if the write happened.
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Option<Duration>)
        -> Result<bool>;

    /// Atomically reads and deletes.
    async fn take(&self, key: &str) -> Result<Option<Value>>;

    /// Returns true if the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// All keys matching `pattern`.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    /// Returns the number of keys removed.
    async fn delete_many(&self, keys: &[String]) -> Result<usize>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// == Remote Backend ==
/// Backend over any [`RemoteClient`].
#[derive(Debug)]
pub struct RemoteBackend<C> {
    client: C,
    prefix: String,
    operation_timeout: Duration,
    default_ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: RemoteClient> RemoteBackend<C> {
    pub fn new(client: C, operation_timeout: Duration) -> Self {
        Self {
            client,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            operation_timeout,
            default_ttl: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Native key for `(region, key)`.
    pub fn native_key(&self, region: &Region, key: &str) -> String {
        format!("{}{}", self.region_prefix(region), key)
    }

    fn region_prefix(&self, region: &Region) -> String {
        format!("{}:{}:{}:", self.prefix, region.as_str().len(), region)
    }

    /// SCAN pattern matching every key of `region`.
    fn region_pattern(&self, region: &Region) -> String {
        format!("{}*", escape_glob(&self.region_prefix(region)))
    }

    fn region_pattern_all(&self) -> String {
        format!("{}:*", escape_glob(&self.prefix))
    }

    /// Runs one client call under the operation deadline.
    async fn timed<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(op, error = %err, "remote cache operation failed");
                Err(err)
            }
            Err(_) => {
                warn!(op, timeout = ?self.operation_timeout, "remote cache operation timed out");
                Err(CacheError::BackendTimeout(self.operation_timeout))
            }
        }
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.default_ttl)
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    async fn region_keys(&self, region: &Region) -> Result<Vec<String>> {
        let pattern = self.region_pattern(region);
        self.timed("scan", self.client.scan(&pattern)).await
    }

    fn strip<'a>(&self, region: &Region, native: &'a str) -> Option<&'a str> {
        native.strip_prefix(&self.region_prefix(region))
    }
}

#[async_trait]
impl<C: RemoteClient> Backend for RemoteBackend<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn get(&self, region: &Region, key: &str) -> Result<Option<Value>> {
        let native = self.native_key(region, key);
        let value = self.timed("get", self.client.get(&native)).await?;
        self.record(value.is_some());
        Ok(value)
    }

    async fn set(
        &self,
        region: &Region,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let native = self.native_key(region, key);
        match self.effective_ttl(ttl) {
            Some(Duration::ZERO) => {
                self.timed("delete", self.client.delete(&native)).await?;
            }
            ttl => {
                self.timed("set", self.client.set(&native, &value, ttl))
                    .await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, region: &Region, key: &str) -> Result<bool> {
        let native = self.native_key(region, key);
        self.timed("delete", self.client.delete(&native)).await
    }

    async fn contains(&self, region: &Region, key: &str) -> Result<bool> {
        let native = self.native_key(region, key);
        self.timed("exists", self.client.exists(&native)).await
    }

    async fn keys(&self, region: &Region) -> Result<Snapshot<String>> {
        let keys: Vec<String> = self
            .region_keys(region)
            .await?
            .iter()
            .filter_map(|native| self.strip(region, native).map(str::to_string))
            .collect();
        Ok(keys.into_iter())
    }

    async fn items(&self, region: &Region) -> Result<Snapshot<(String, Value)>> {
        let mut items = Vec::new();
        for native in self.region_keys(region).await? {
            let Some(key) = self.strip(region, &native) else {
                continue;
            };
            // Keys that expire between SCAN and GET are skipped.
            if let Some(value) = self.timed("get", self.client.get(&native)).await? {
                items.push((key.to_string(), value));
            }
        }
        Ok(items.into_iter())
    }

    async fn pop(&self, region: &Region, key: &str) -> Result<Option<Value>> {
        let native = self.native_key(region, key);
        self.timed("take", self.client.take(&native)).await
    }

    async fn popitem(&self, region: &Region) -> Result<(String, Value)> {
        for native in self.region_keys(region).await? {
            let Some(key) = self.strip(region, &native) else {
                continue;
            };
            if let Some(value) = self.timed("take", self.client.take(&native)).await? {
                return Ok((key.to_string(), value));
            }
        }
        Err(CacheError::EmptyCache(region.to_string()))
    }

    async fn setdefault(
        &self,
        region: &Region,
        key: &str,
        default: Value,
        ttl: Option<Duration>,
    ) -> Result<Value> {
        let native = self.native_key(region, key);
        let ttl = self.effective_ttl(ttl);
        if ttl == Some(Duration::ZERO) {
            if let Some(existing) = self.timed("get", self.client.get(&native)).await? {
                return Ok(existing);
            }
            return Ok(default);
        }

        for _ in 0..SETDEFAULT_ATTEMPTS {
            let inserted = self
                .timed(
                    "set_if_absent",
                    self.client.set_if_absent(&native, &default, ttl),
                )
                .await?;
            if inserted {
                return Ok(default);
            }
            if let Some(existing) = self.timed("get", self.client.get(&native)).await? {
                return Ok(existing);
            }
        }
        Err(CacheError::Internal(format!(
            "setdefault on '{}' kept racing concurrent writers",
            native
        )))
    }

    async fn clear(&self, region: &Region) -> Result<()> {
        let keys = self.region_keys(region).await?;
        if !keys.is_empty() {
            self.timed("delete_many", self.client.delete_many(&keys))
                .await?;
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let pattern = self.region_pattern_all();
        let keys = self.timed("scan", self.client.scan(&pattern)).await?;
        if !keys.is_empty() {
            self.timed("delete_many", self.client.delete_many(&keys))
                .await?;
        }
        Ok(())
    }

    async fn len(&self, region: &Region) -> Result<usize> {
        Ok(self.region_keys(region).await?.len())
    }

    async fn stats(&self, region: &Region) -> Result<CacheStats> {
        let entries = self.len(region).await?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
        .with_entries(entries))
    }

    async fn stats_all(&self) -> Result<CacheStats> {
        let pattern = self.region_pattern_all();
        let entries = self.timed("scan", self.client.scan(&pattern)).await?.len();
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
        .with_entries(entries))
    }

    async fn close(&self) -> Result<()> {
        self.client.close().await
    }
}

/// Escapes glob metacharacters so region and prefix names match literally.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
