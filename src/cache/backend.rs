//! Backend Module
//!
//! The capability interface every storage implementation satisfies. Both
//! facades are thin adapters over this one operation set, so TTL and eviction
//! rules are written exactly once per backend.

use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CacheStats, Region, Snapshot, Value};
use crate::error::Result;

/// Which family of storage a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Bounded in-process store
    Local,
    /// External key/value service
    Remote,
    /// One file per entry on a local filesystem
    File,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
            BackendKind::File => "file",
        }
    }
}

/// Mapping operations scoped to a resolved region.
///
/// `ttl` arguments are explicit per-call TTLs; `None` defers to the backend's
/// configured default (which may itself be "never expires").
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Live value for `key`, `None` on a miss.
    async fn get(&self, region: &Region, key: &str) -> Result<Option<Value>>;

    async fn set(&self, region: &Region, key: &str, value: Value, ttl: Option<Duration>)
        -> Result<()>;

    /// Returns true if a live entry was removed.
    async fn delete(&self, region: &Region, key: &str) -> Result<bool>;

    async fn contains(&self, region: &Region, key: &str) -> Result<bool>;

    async fn keys(&self, region: &Region) -> Result<Snapshot<String>>;

    async fn values(&self, region: &Region) -> Result<Snapshot<Value>> {
        let items = self.items(region).await?;
        Ok(items.map(|(_, value)| value).collect::<Vec<_>>().into_iter())
    }

    async fn items(&self, region: &Region) -> Result<Snapshot<(String, Value)>>;

    /// Applies `set` for every pair in order, stopping at the first failure.
    /// Pairs applied before the failure stay applied.
    async fn update(
        &self,
        region: &Region,
        pairs: Vec<(String, Value)>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        for (key, value) in pairs {
            self.set(region, &key, value, ttl).await?;
        }
        Ok(())
    }

    /// Atomically removes `key` and returns its live value.
    async fn pop(&self, region: &Region, key: &str) -> Result<Option<Value>>;

    /// Removes and returns some live entry; `EmptyCache` if there is none.
    async fn popitem(&self, region: &Region) -> Result<(String, Value)>;

    /// Atomic get-or-insert.
    async fn setdefault(
        &self,
        region: &Region,
        key: &str,
        default: Value,
        ttl: Option<Duration>,
    ) -> Result<Value>;

    /// Removes every entry in `region`; other regions are untouched.
    async fn clear(&self, region: &Region) -> Result<()>;

    /// Removes every entry in every region.
    async fn clear_all(&self) -> Result<()>;

    /// Number of live entries in `region`.
    async fn len(&self, region: &Region) -> Result<usize>;

    async fn stats(&self, region: &Region) -> Result<CacheStats>;

    /// Counters and live entries summed over every region.
    async fn stats_all(&self) -> Result<CacheStats>;

    /// Physically removes expired entries. Returns how many were dropped.
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }

    /// Releases connections held by the backend.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
