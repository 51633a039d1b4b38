//! regioncache - a unified cache layer
//!
//! One mapping interface over interchangeable storage backends. Entries live
//! in named regions, may carry a TTL, and local regions are bounded with LRU
//! eviction. The same operations are offered through a blocking [`Cache`] and
//! an async [`AsyncCache`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use regioncache::{Cache, LocalBackend};
//!
//! let cache = Cache::new(Arc::new(LocalBackend::default())).unwrap();
//! cache.set("user:1", b"alice".to_vec(), None, Some("users")).unwrap();
//! assert_eq!(cache.get("user:1", Some("users")).unwrap(), Some(b"alice".to_vec()));
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{
    AsyncCache, Backend, Cache, FileBackend, LocalBackend, Region, RemoteBackend, RemoteClient,
};
pub use config::Config;
pub use error::{CacheError, Result};
pub use keys::{build_key, KeyArg};
pub use tasks::spawn_cleanup_task;
