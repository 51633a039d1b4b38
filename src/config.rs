//! Configuration Module
//!
//! Handles loading cache configuration from environment variables and
//! constructing the configured backend.

use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::{
    Backend, FileBackend, LocalBackend, RedisClient, RemoteBackend, DEFAULT_KEY_PREFIX,
    DEFAULT_MAX_ENTRIES,
};
use crate::error::{CacheError, Result};

/// Which backend `build_backend` constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Local,
    Remote,
    File,
}

impl FromStr for BackendType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "memory" => Ok(BackendType::Local),
            "remote" | "redis" => Ok(BackendType::Remote),
            "file" | "disk" => Ok(BackendType::File),
            other => Err(CacheError::Config(format!("unknown backend type '{}'", other))),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend selected at construction
    pub backend: BackendType,
    /// Maximum number of entries per region (local backend only)
    pub max_entries: usize,
    /// Default TTL for entries set without one; None = never expire
    pub default_ttl: Option<Duration>,
    /// Remote service URL (remote backend only)
    pub remote_url: String,
    /// Prefix for native keys (remote backend only)
    pub remote_key_prefix: String,
    /// Per-operation deadline (remote backend only)
    pub operation_timeout: Duration,
    /// Root directory for region directories (file backend only)
    pub file_cache_dir: PathBuf,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval
    pub cleanup_interval: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `local`, `remote` or `file` (default: local)
    /// - `MAX_ENTRIES` - Maximum entries per region (default: 1024)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 or unset for none
    /// - `REMOTE_URL` - Remote service URL (default: redis://127.0.0.1:6379)
    /// - `REMOTE_KEY_PREFIX` - Native key prefix (default: regioncache)
    /// - `OPERATION_TIMEOUT_MS` - Remote operation deadline (default: 2000)
    /// - `FILE_CACHE_DIR` - File backend root directory (default: ./cache-data)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env_parse("CACHE_BACKEND").unwrap_or(defaults.backend),
            max_entries: env_parse("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: env_parse::<u64>("DEFAULT_TTL")
                .map(|secs| (secs > 0).then(|| Duration::from_secs(secs)))
                .unwrap_or(defaults.default_ttl),
            remote_url: env::var("REMOTE_URL").unwrap_or(defaults.remote_url),
            remote_key_prefix: env::var("REMOTE_KEY_PREFIX")
                .unwrap_or(defaults.remote_key_prefix),
            operation_timeout: env_parse("OPERATION_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.operation_timeout),
            file_cache_dir: env::var("FILE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_cache_dir),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: env_parse("CLEANUP_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Rejects values no backend can honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::Config(
                "MAX_ENTRIES must be a positive integer".to_string(),
            ));
        }
        if self.operation_timeout.is_zero() {
            return Err(CacheError::Config(
                "OPERATION_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::Config(
                "CLEANUP_INTERVAL must be greater than zero".to_string(),
            ));
        }
        if self.remote_key_prefix.is_empty() {
            return Err(CacheError::Config(
                "REMOTE_KEY_PREFIX cannot be empty".to_string(),
            ));
        }
        if self.file_cache_dir.as_os_str().is_empty() {
            return Err(CacheError::Config(
                "FILE_CACHE_DIR cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Constructs the configured backend, connecting to the remote service
    /// when one is selected.
    pub async fn build_backend(&self) -> Result<Arc<dyn Backend>> {
        self.validate()?;
        match self.backend {
            BackendType::Local => {
                let max_entries = NonZeroUsize::new(self.max_entries).ok_or_else(|| {
                    CacheError::Config("MAX_ENTRIES must be a positive integer".to_string())
                })?;
                info!(
                    max_entries = self.max_entries,
                    default_ttl = ?self.default_ttl,
                    "using local cache backend"
                );
                Ok(Arc::new(LocalBackend::new(max_entries, self.default_ttl)))
            }
            BackendType::Remote => {
                let client = RedisClient::connect(&self.remote_url).await?;
                info!(
                    url = %self.remote_url,
                    timeout = ?self.operation_timeout,
                    "using remote cache backend"
                );
                Ok(Arc::new(
                    RemoteBackend::new(client, self.operation_timeout)
                        .with_prefix(self.remote_key_prefix.clone())
                        .with_default_ttl(self.default_ttl),
                ))
            }
            BackendType::File => {
                let backend = FileBackend::open(&self.file_cache_dir, self.default_ttl).await?;
                info!(
                    root = %self.file_cache_dir.display(),
                    default_ttl = ?self.default_ttl,
                    "using file cache backend"
                );
                Ok(Arc::new(backend))
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendType::Local,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: None,
            remote_url: "redis://127.0.0.1:6379".to_string(),
            remote_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            operation_timeout: Duration::from_millis(2000),
            file_cache_dir: PathBuf::from("./cache-data"),
            server_port: 3000,
            cleanup_interval: Duration::from_secs(1),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
