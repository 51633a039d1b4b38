//! Cache Module
//!
//! Region-partitioned caching with TTL expiration and LRU eviction behind one
//! backend contract, served through blocking and async facades.

mod backend;
mod entry;
mod facade;
mod file;
mod local;
mod lru;
mod redis_client;
mod region;
mod remote;
mod stats;
mod store;


// Re-export public types
pub use backend::{Backend, BackendKind};
pub use entry::CacheEntry;
pub use facade::{AsyncCache, Cache};
pub use file::FileBackend;
pub use local::{LocalBackend, DEFAULT_MAX_ENTRIES};
pub use lru::LruTracker;
pub use redis_client::RedisClient;
pub use region::{Region, RegionRegistry, DEFAULT_REGION};
pub use remote::{RemoteBackend, RemoteClient, DEFAULT_KEY_PREFIX, DEFAULT_OPERATION_TIMEOUT};
pub use stats::CacheStats;
pub use store::CacheStore;

/// Opaque value bytes, already encoded by the caller.
pub type Value = Vec<u8>;

/// Owned, finite, point-in-time iteration over a region.
pub type Snapshot<T> = std::vec::IntoIter<T>;
