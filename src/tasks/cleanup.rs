//! TTL Cleanup Task
//!
//! Background task that periodically purges expired cache entries, so that
//! entries nobody reads again still release their memory.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Backend;

/// Spawns a background task that periodically purges expired entries.
///
/// The task sleeps for `interval` between sweeps. Each sweep locks one region
/// at a time, so readers of other regions are never blocked by it. Backends
/// that delegate expiry (remote) report zero purged entries.
///
/// Returns a JoinHandle which can be used to abort the task during shutdown.
///
/// # Example
/// ```ignore
/// let backend: Arc<dyn Backend> = Arc::new(LocalBackend::default());
/// let cleanup_handle = spawn_cleanup_task(backend.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(backend: Arc<dyn Backend>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            match backend.purge_expired().await {
                Ok(0) => debug!("TTL cleanup: no expired entries found"),
                Ok(removed) => info!(removed, "TTL cleanup: removed expired entries"),
                Err(err) => warn!(error = %err, "TTL cleanup failed"),
            }
        }
    })
}
