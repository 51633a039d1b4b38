//! Local Backend Module
//!
//! Bounded in-process backend. Every region owns an independent `CacheStore`
//! behind its own `parking_lot::RwLock`. Operations are synchronous critical
//! sections: no lock is ever held across an `.await`, and none of the async
//! methods below actually suspend.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cache::{
    Backend, BackendKind, CacheStats, CacheStore, Region, RegionRegistry, Snapshot, Value,
};
use crate::error::{CacheError, Result};

/// Default per-region capacity.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

// == Local Backend ==
/// In-process backend with per-region LRU bounds and TTL expiry.
#[derive(Debug)]
pub struct LocalBackend {
    regions: RegionRegistry<CacheStore>,
    max_entries: NonZeroUsize,
    default_ttl: Option<Duration>,
}

impl LocalBackend {
    // == Constructor ==
    /// Creates a backend whose regions each hold at most `max_entries` entries.
    ///
    /// `default_ttl` applies to `set` calls that do not pass their own TTL.
    pub fn new(max_entries: NonZeroUsize, default_ttl: Option<Duration>) -> Self {
        Self {
            regions: RegionRegistry::new(),
            max_entries,
            default_ttl,
        }
    }

    /// Materialises `region` with its own capacity.
    ///
    /// Fails if the region already holds a store, since shrinking a live
    /// region would require an eviction sweep outside any caller's operation.
    pub fn configure_region(&self, region: &Region, max_entries: NonZeroUsize) -> Result<()> {
        if !self.regions.insert_new(region, CacheStore::new(max_entries)) {
            return Err(CacheError::InvalidRegion(format!(
                "region '{}' is already in use",
                region
            )));
        }
        debug!(region = %region, max_entries = max_entries.get(), "configured cache region");
        Ok(())
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries.get()
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    fn store(&self, region: &Region) -> std::sync::Arc<RwLock<CacheStore>> {
        self.regions
            .get_or_create(region, || CacheStore::new(self.max_entries))
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.default_ttl)
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN),
            None,
        )
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn get(&self, region: &Region, key: &str) -> Result<Option<Value>> {
        Ok(match self.regions.get(region) {
            Some(store) => store.write().get(key),
            None => None,
        })
    }

    async fn set(
        &self,
        region: &Region,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let ttl = self.effective_ttl(ttl);
        self.store(region).write().set(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, region: &Region, key: &str) -> Result<bool> {
        Ok(match self.regions.get(region) {
            Some(store) => store.write().delete(key),
            None => false,
        })
    }

    async fn contains(&self, region: &Region, key: &str) -> Result<bool> {
        Ok(self
            .regions
            .get(region)
            .is_some_and(|store| store.read().contains(key)))
    }

    async fn keys(&self, region: &Region) -> Result<Snapshot<String>> {
        let keys = match self.regions.get(region) {
            Some(store) => store.read().keys(),
            None => Vec::new(),
        };
        Ok(keys.into_iter())
    }

    async fn values(&self, region: &Region) -> Result<Snapshot<Value>> {
        let values = match self.regions.get(region) {
            Some(store) => store.read().values(),
            None => Vec::new(),
        };
        Ok(values.into_iter())
    }

    async fn items(&self, region: &Region) -> Result<Snapshot<(String, Value)>> {
        let items = match self.regions.get(region) {
            Some(store) => store.read().items(),
            None => Vec::new(),
        };
        Ok(items.into_iter())
    }

    async fn pop(&self, region: &Region, key: &str) -> Result<Option<Value>> {
        Ok(match self.regions.get(region) {
            Some(store) => store.write().pop(key),
            None => None,
        })
    }

    async fn popitem(&self, region: &Region) -> Result<(String, Value)> {
        self.regions
            .get(region)
            .and_then(|store| store.write().pop_lru())
            .ok_or_else(|| CacheError::EmptyCache(region.to_string()))
    }

    async fn setdefault(
        &self,
        region: &Region,
        key: &str,
        default: Value,
        ttl: Option<Duration>,
    ) -> Result<Value> {
        let ttl = self.effective_ttl(ttl);
        Ok(self.store(region).write().setdefault(key, default, ttl))
    }

    async fn clear(&self, region: &Region) -> Result<()> {
        if let Some(store) = self.regions.get(region) {
            let removed = store.write().clear();
            debug!(region = %region, removed, "cleared cache region");
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut removed = 0;
        for (_, store) in self.regions.all() {
            removed += store.write().clear();
        }
        info!(removed, "cleared all cache regions");
        Ok(())
    }

    async fn len(&self, region: &Region) -> Result<usize> {
        Ok(match self.regions.get(region) {
            Some(store) => store.write().live_len(),
            None => 0,
        })
    }

    async fn stats(&self, region: &Region) -> Result<CacheStats> {
        Ok(match self.regions.get(region) {
            Some(store) => store.read().stats(),
            None => CacheStats::new(),
        })
    }

    async fn stats_all(&self) -> Result<CacheStats> {
        let mut total = CacheStats::new();
        for (_, store) in self.regions.all() {
            total.merge(&store.read().stats());
        }
        Ok(total)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for (region, store) in self.regions.all() {
            let count = store.write().cleanup_expired();
            if count > 0 {
                debug!(region = %region, count, "purged expired entries");
            }
            removed += count;
        }
        Ok(removed)
    }
}
