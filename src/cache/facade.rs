//! Cache Facade Module
//!
//! Public mapping interface over a [`Backend`]. [`AsyncCache`] awaits backend
//! operations; [`Cache`] blocks the calling thread on the very same futures
//! using an owned Tokio runtime. Neither adds policy of its own, so both
//! observe identical atomicity, ordering and error semantics.
//!
//! Every named operation takes `region: Option<&str>`; `None` resolves to the
//! facade's default region. The indexing-style helpers (`item`, `set_item`,
//! `del_item`, `contains_key`, `iter`) always act on the default region.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;

use crate::cache::{Backend, CacheStats, Region, Snapshot, Value};
use crate::error::{CacheError, Result};

// == Async Facade ==
/// Suspend-capable facade.
#[derive(Clone)]
pub struct AsyncCache {
    backend: Arc<dyn Backend>,
    default_region: Region,
}

impl AsyncCache {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            default_region: Region::default(),
        }
    }

    /// Uses `region` whenever a call does not name one.
    pub fn with_default_region(mut self, region: &str) -> Result<Self> {
        self.default_region = Region::new(region)?;
        Ok(self)
    }

    pub fn default_region(&self) -> &Region {
        &self.default_region
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn is_remote(&self) -> bool {
        self.backend.kind() == crate::cache::BackendKind::Remote
    }

    fn resolve(&self, region: Option<&str>) -> Result<Region> {
        Region::resolve(region, &self.default_region)
    }

    // == Named Operations ==

    pub async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<Value>> {
        let region = self.resolve(region)?;
        self.backend.get(&region, key).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: impl Into<Value>,
        ttl: Option<Duration>,
        region: Option<&str>,
    ) -> Result<()> {
        let region = self.resolve(region)?;
        self.backend.set(&region, key, value.into(), ttl).await
    }

    pub async fn delete(&self, key: &str, region: Option<&str>) -> Result<bool> {
        let region = self.resolve(region)?;
        self.backend.delete(&region, key).await
    }

    pub async fn contains(&self, key: &str, region: Option<&str>) -> Result<bool> {
        let region = self.resolve(region)?;
        self.backend.contains(&region, key).await
    }

    pub async fn keys(&self, region: Option<&str>) -> Result<Snapshot<String>> {
        let region = self.resolve(region)?;
        self.backend.keys(&region).await
    }

    pub async fn values(&self, region: Option<&str>) -> Result<Snapshot<Value>> {
        let region = self.resolve(region)?;
        self.backend.values(&region).await
    }

    pub async fn items(&self, region: Option<&str>) -> Result<Snapshot<(String, Value)>> {
        let region = self.resolve(region)?;
        self.backend.items(&region).await
    }

    /// Sets every pair; returns the first failure without rolling back.
    pub async fn update<I, K, V>(
        &self,
        pairs: I,
        ttl: Option<Duration>,
        region: Option<&str>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let region = self.resolve(region)?;
        let pairs = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.backend.update(&region, pairs, ttl).await
    }

    /// Removes `key` and returns its value, or `default` on a miss.
    ///
    /// Without a default a miss raises `KeyNotFound`.
    pub async fn pop(
        &self,
        key: &str,
        default: Option<Value>,
        region: Option<&str>,
    ) -> Result<Value> {
        let region = self.resolve(region)?;
        let popped = self.backend.pop(&region, key).await?;
        resolve_pop(key, popped, default)
    }

    pub async fn popitem(&self, region: Option<&str>) -> Result<(String, Value)> {
        let region = self.resolve(region)?;
        self.backend.popitem(&region).await
    }

    pub async fn setdefault(
        &self,
        key: &str,
        default: impl Into<Value>,
        ttl: Option<Duration>,
        region: Option<&str>,
    ) -> Result<Value> {
        let region = self.resolve(region)?;
        self.backend
            .setdefault(&region, key, default.into(), ttl)
            .await
    }

    pub async fn clear(&self, region: Option<&str>) -> Result<()> {
        let region = self.resolve(region)?;
        self.backend.clear(&region).await
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.backend.clear_all().await
    }

    pub async fn len(&self, region: Option<&str>) -> Result<usize> {
        let region = self.resolve(region)?;
        self.backend.len(&region).await
    }

    pub async fn is_empty(&self, region: Option<&str>) -> Result<bool> {
        Ok(self.len(region).await? == 0)
    }

    pub async fn stats(&self, region: Option<&str>) -> Result<CacheStats> {
        let region = self.resolve(region)?;
        self.backend.stats(&region).await
    }

    /// Statistics summed over every region.
    pub async fn stats_all(&self) -> Result<CacheStats> {
        self.backend.stats_all().await
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        self.backend.purge_expired().await
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }

    // == Indexing Helpers ==

    /// `cache[key]`: value for `key`, `KeyNotFound` on a miss.
    pub async fn item(&self, key: &str) -> Result<Value> {
        self.get(key, None)
            .await?
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
    }

    /// `cache[key] = value`
    pub async fn set_item(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.set(key, value, None, None).await
    }

    /// `del cache[key]`: `KeyNotFound` if there was no live entry.
    pub async fn del_item(&self, key: &str) -> Result<()> {
        if self.delete(key, None).await? {
            Ok(())
        } else {
            Err(CacheError::KeyNotFound(key.to_string()))
        }
    }

    /// `key in cache`
    pub async fn contains_key(&self, key: &str) -> Result<bool> {
        self.contains(key, None).await
    }

    /// `iter(cache)`: snapshot of the default region's keys.
    pub async fn iter(&self) -> Result<Snapshot<String>> {
        self.keys(None).await
    }
}

impl std::fmt::Debug for AsyncCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCache")
            .field("kind", &self.backend.kind())
            .field("default_region", &self.default_region)
            .finish()
    }
}

fn resolve_pop(key: &str, popped: Option<Value>, default: Option<Value>) -> Result<Value> {
    popped
        .or(default)
        .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
}

// == Blocking Facade ==
/// Blocking facade.
///
/// Drives the async facade on an owned runtime, so it must not be called from
/// inside another Tokio runtime's worker thread. Local backends never suspend,
/// so for them `block_on` completes without touching the runtime's drivers.
pub struct Cache {
    inner: AsyncCache,
    runtime: Runtime,
}

impl Cache {
    pub fn new(backend: Arc<dyn Backend>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("regioncache-blocking")
            .enable_all()
            .build()
            .map_err(|err| CacheError::Internal(format!("failed to start runtime: {}", err)))?;
        Ok(Self {
            inner: AsyncCache::new(backend),
            runtime,
        })
    }

    pub fn with_default_region(mut self, region: &str) -> Result<Self> {
        self.inner = self.inner.with_default_region(region)?;
        Ok(self)
    }

    /// The async facade sharing this cache's backend.
    pub fn as_async(&self) -> &AsyncCache {
        &self.inner
    }

    pub fn default_region(&self) -> &Region {
        self.inner.default_region()
    }

    pub fn is_remote(&self) -> bool {
        self.inner.is_remote()
    }

    // == Named Operations ==

    pub fn get(&self, key: &str, region: Option<&str>) -> Result<Option<Value>> {
        self.runtime.block_on(self.inner.get(key, region))
    }

    pub fn set(
        &self,
        key: &str,
        value: impl Into<Value>,
        ttl: Option<Duration>,
        region: Option<&str>,
    ) -> Result<()> {
        self.runtime
            .block_on(self.inner.set(key, value, ttl, region))
    }

    pub fn delete(&self, key: &str, region: Option<&str>) -> Result<bool> {
        self.runtime.block_on(self.inner.delete(key, region))
    }

    pub fn contains(&self, key: &str, region: Option<&str>) -> Result<bool> {
        self.runtime.block_on(self.inner.contains(key, region))
    }

    pub fn keys(&self, region: Option<&str>) -> Result<Snapshot<String>> {
        self.runtime.block_on(self.inner.keys(region))
    }

    pub fn values(&self, region: Option<&str>) -> Result<Snapshot<Value>> {
        self.runtime.block_on(self.inner.values(region))
    }

    pub fn items(&self, region: Option<&str>) -> Result<Snapshot<(String, Value)>> {
        self.runtime.block_on(self.inner.items(region))
    }

    pub fn update<I, K, V>(&self, pairs: I, ttl: Option<Duration>, region: Option<&str>) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.runtime
            .block_on(self.inner.update(pairs, ttl, region))
    }

    pub fn pop(&self, key: &str, default: Option<Value>, region: Option<&str>) -> Result<Value> {
        self.runtime
            .block_on(self.inner.pop(key, default, region))
    }

    pub fn popitem(&self, region: Option<&str>) -> Result<(String, Value)> {
        self.runtime.block_on(self.inner.popitem(region))
    }

    pub fn setdefault(
        &self,
        key: &str,
        default: impl Into<Value>,
        ttl: Option<Duration>,
        region: Option<&str>,
    ) -> Result<Value> {
        self.runtime
            .block_on(self.inner.setdefault(key, default, ttl, region))
    }

    pub fn clear(&self, region: Option<&str>) -> Result<()> {
        self.runtime.block_on(self.inner.clear(region))
    }

    pub fn clear_all(&self) -> Result<()> {
        self.runtime.block_on(self.inner.clear_all())
    }

    pub fn len(&self, region: Option<&str>) -> Result<usize> {
        self.runtime.block_on(self.inner.len(region))
    }

    pub fn is_empty(&self, region: Option<&str>) -> Result<bool> {
        self.runtime.block_on(self.inner.is_empty(region))
    }

    pub fn stats(&self, region: Option<&str>) -> Result<CacheStats> {
        self.runtime.block_on(self.inner.stats(region))
    }

    pub fn stats_all(&self) -> Result<CacheStats> {
        self.runtime.block_on(self.inner.stats_all())
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.runtime.block_on(self.inner.purge_expired())
    }

    pub fn close(&self) -> Result<()> {
        self.runtime.block_on(self.inner.close())
    }

    // == Indexing Helpers ==

    pub fn item(&self, key: &str) -> Result<Value> {
        self.runtime.block_on(self.inner.item(key))
    }

    pub fn set_item(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.runtime.block_on(self.inner.set_item(key, value))
    }

    pub fn del_item(&self, key: &str) -> Result<()> {
        self.runtime.block_on(self.inner.del_item(key))
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.contains_key(key))
    }

    pub fn iter(&self) -> Result<Snapshot<String>> {
        self.runtime.block_on(self.inner.iter())
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("inner", &self.inner).finish()
    }
}
