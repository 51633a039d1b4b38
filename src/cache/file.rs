//! File Backend Module
//!
//! Persistent backend keeping one directory per region under a root
//! directory and one file per key. Region and key names are hex encoded, so
//! any name becomes a valid file name and case is preserved on every
//! filesystem.
//!
//! Each file holds an 8-byte big-endian expiry deadline in Unix milliseconds
//! (0 = never expires) followed by the value bytes. Writes land in a
//! temporary file inside the region directory and are renamed into place, so
//! readers never observe a partial value.
//!
//! ## Capabilities
//! - `set`, `pop` and `setdefault` are atomic per key: rename for writes,
//!   rename-then-read for `pop`, a hard link for create-if-absent.
//! - `clear` removes files one at a time, so a `set` racing it may survive.
//! - Expired files are removed when read and by `purge_expired`.
//! - Hit, miss and expiration counters are process-wide, not per region.
//! - Snapshots are ordered by key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cache::{Backend, BackendKind, CacheStats, Region, Snapshot, Value};
use crate::error::{CacheError, Result};

/// Longest region or key name, in bytes, whose hex form fits a file name.
pub const MAX_NAME_BYTES: usize = 127;

const HEADER_LEN: usize = 8;

/// Attempts `setdefault` makes while other writers keep replacing the key.
const SETDEFAULT_ATTEMPTS: usize = 3;

/// In-flight files start with a dot, which hex names never do.
const TEMP_PREFIX: &str = ".tmp-";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

// == File Backend ==
/// Backend storing every entry as a file under `root`.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    default_ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

/// A decoded entry file.
struct StoredEntry {
    deadline: Option<i64>,
    value: Value,
}

impl StoredEntry {
    fn is_expired_at(&self, now_ms: i64) -> bool {
        self.deadline.is_some_and(|deadline| now_ms >= deadline)
    }
}

impl FileBackend {
    /// Backend over `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>, default_ttl: Option<Duration>) -> Self {
        Self {
            root: root.into(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Creates `root` if needed and returns a backend over it.
    pub async fn open(root: impl Into<PathBuf>, default_ttl: Option<Duration>) -> Result<Self> {
        let backend = Self::new(root, default_ttl);
        fs::create_dir_all(&backend.root)
            .await
            .map_err(|err| io_error("create", &backend.root, err))?;
        info!(root = %backend.root.display(), "opened file cache");
        Ok(backend)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn region_dir(&self, region: &Region) -> Result<PathBuf> {
        if region.as_str().len() > MAX_NAME_BYTES {
            return Err(CacheError::InvalidRegion(format!(
                "region name longer than {} bytes",
                MAX_NAME_BYTES
            )));
        }
        Ok(self.root.join(hex::encode(region.as_str())))
    }

    /// Region directory and entry file for `(region, key)`.
    fn entry_path(&self, region: &Region, key: &str) -> Result<(PathBuf, PathBuf)> {
        if key.len() > MAX_NAME_BYTES {
            return Err(CacheError::InvalidRequest(format!(
                "key longer than {} bytes",
                MAX_NAME_BYTES
            )));
        }
        let dir = self.region_dir(region)?;
        let path = dir.join(hex::encode(key));
        Ok((dir, path))
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.default_ttl)
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Writes a complete entry file at a fresh temporary path inside `dir`.
    async fn write_temp(&self, dir: &Path, value: &[u8], ttl: Option<Duration>) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .await
            .map_err(|err| io_error("create", dir, err))?;
        let temp = temp_path(dir);
        fs::write(&temp, encode(value, ttl))
            .await
            .map_err(|err| io_error("write", &temp, err))?;
        Ok(temp)
    }

    /// Atomically detaches the file at `path` and returns its live value.
    async fn take(&self, dir: &Path, path: &Path) -> Result<Option<Value>> {
        let claimed = temp_path(dir);
        match fs::rename(path, &claimed).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error("rename", path, err)),
        }
        let entry = read_entry(&claimed).await;
        remove_quietly(&claimed).await;
        match entry? {
            Some(entry) if entry.is_expired_at(now_ms()) => {
                self.record_expiration();
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    /// Removes `path` if it still holds an expired entry.
    ///
    /// The file is claimed by rename first. If a live write replaced it in
    /// the meantime, the claimed file is linked back unless a newer write has
    /// already taken its place.
    async fn remove_expired(&self, dir: &Path, path: &Path, now_ms: i64) -> Result<bool> {
        let claimed = temp_path(dir);
        match fs::rename(path, &claimed).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(io_error("rename", path, err)),
        }

        // Unreadable files are dropped without counting as expirations
        let (live, expired) = match read_entry(&claimed).await {
            Ok(Some(entry)) if entry.is_expired_at(now_ms) => (false, true),
            Ok(Some(_)) => (true, false),
            Ok(None) | Err(_) => (false, false),
        };
        if live {
            match fs::hard_link(&claimed, path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => warn!(path = %path.display(), error = %err, "failed to restore live entry"),
            }
        }
        remove_quietly(&claimed).await;

        if expired {
            self.record_expiration();
        }
        Ok(expired)
    }

    /// Live `(key, value)` pairs of one region directory, ordered by key.
    async fn live_items(&self, dir: &Path) -> Result<Vec<(String, Value)>> {
        let now = now_ms();
        let mut items = Vec::new();
        for (key, path) in list_named(dir, false).await? {
            if let Some(entry) = read_entry(&path).await? {
                if !entry.is_expired_at(now) {
                    items.push((key, entry.value));
                }
            }
        }
        Ok(items)
    }

    async fn clear_dir(dir: &Path) -> Result<usize> {
        let mut removed = 0;
        for (_, path) in list_named(dir, false).await? {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_error("remove", &path, err)),
            }
        }
        Ok(removed)
    }

    fn counters(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn get(&self, region: &Region, key: &str) -> Result<Option<Value>> {
        let (dir, path) = self.entry_path(region, key)?;
        let now = now_ms();
        let value = match read_entry(&path).await? {
            Some(entry) if entry.is_expired_at(now) => {
                self.remove_expired(&dir, &path, now).await?;
                None
            }
            Some(entry) => Some(entry.value),
            None => None,
        };
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
        let (dir, path) = self.entry_path(region, key)?;
        match self.effective_ttl(ttl) {
            Some(Duration::ZERO) => match fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(io_error("remove", &path, err)),
            },
            ttl => {
                let temp = self.write_temp(&dir, &value, ttl).await?;
                if let Err(err) = fs::rename(&temp, &path).await {
                    remove_quietly(&temp).await;
                    return Err(io_error("rename", &path, err));
                }
                Ok(())
            }
        }
    }

    async fn delete(&self, region: &Region, key: &str) -> Result<bool> {
        let (dir, path) = self.entry_path(region, key)?;
        Ok(self.take(&dir, &path).await?.is_some())
    }

    async fn contains(&self, region: &Region, key: &str) -> Result<bool> {
        let (_, path) = self.entry_path(region, key)?;
        let now = now_ms();
        Ok(read_entry(&path)
            .await?
            .is_some_and(|entry| !entry.is_expired_at(now)))
    }

    async fn keys(&self, region: &Region) -> Result<Snapshot<String>> {
        let dir = self.region_dir(region)?;
        let keys: Vec<String> = self
            .live_items(&dir)
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        Ok(keys.into_iter())
    }

    async fn items(&self, region: &Region) -> Result<Snapshot<(String, Value)>> {
        let dir = self.region_dir(region)?;
        Ok(self.live_items(&dir).await?.into_iter())
    }

    async fn pop(&self, region: &Region, key: &str) -> Result<Option<Value>> {
        let (dir, path) = self.entry_path(region, key)?;
        self.take(&dir, &path).await
    }

    async fn popitem(&self, region: &Region) -> Result<(String, Value)> {
        let dir = self.region_dir(region)?;
        for (key, path) in list_named(&dir, false).await? {
            if let Some(value) = self.take(&dir, &path).await? {
                return Ok((key, value));
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
        let (dir, path) = self.entry_path(region, key)?;
        let ttl = self.effective_ttl(ttl);
        if ttl == Some(Duration::ZERO) {
            let now = now_ms();
            return Ok(match read_entry(&path).await? {
                Some(entry) if !entry.is_expired_at(now) => entry.value,
                _ => default,
            });
        }

        let temp = self.write_temp(&dir, &default, ttl).await?;
        let mut outcome = Err(CacheError::Internal(format!(
            "setdefault on '{}' kept racing concurrent writers",
            key
        )));
        for _ in 0..SETDEFAULT_ATTEMPTS {
            match fs::hard_link(&temp, &path).await {
                Ok(()) => {
                    outcome = Ok(default);
                    break;
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => {
                    outcome = Err(io_error("link", &path, err));
                    break;
                }
            }

            let now = now_ms();
            match read_entry(&path).await {
                Ok(Some(entry)) if !entry.is_expired_at(now) => {
                    outcome = Ok(entry.value);
                    break;
                }
                Ok(Some(_)) => {
                    if let Err(err) = self.remove_expired(&dir, &path, now).await {
                        outcome = Err(err);
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        remove_quietly(&temp).await;
        outcome
    }

    async fn clear(&self, region: &Region) -> Result<()> {
        let dir = self.region_dir(region)?;
        let removed = Self::clear_dir(&dir).await?;
        debug!(region = %region, removed, "cleared cache region");
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut removed = 0;
        for (_, dir) in list_named(&self.root, true).await? {
            removed += Self::clear_dir(&dir).await?;
        }
        info!(removed, "cleared all cache regions");
        Ok(())
    }

    async fn len(&self, region: &Region) -> Result<usize> {
        let dir = self.region_dir(region)?;
        Ok(self.live_items(&dir).await?.len())
    }

    async fn stats(&self, region: &Region) -> Result<CacheStats> {
        let entries = self.len(region).await?;
        Ok(self.counters().with_entries(entries))
    }

    async fn stats_all(&self) -> Result<CacheStats> {
        let mut entries = 0;
        for (_, dir) in list_named(&self.root, true).await? {
            entries += self.live_items(&dir).await?.len();
        }
        Ok(self.counters().with_entries(entries))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for (region, dir) in list_named(&self.root, true).await? {
            let now = now_ms();
            let mut count = 0;
            for (_, path) in list_named(&dir, false).await? {
                let expired = read_entry(&path)
                    .await?
                    .is_some_and(|entry| entry.is_expired_at(now));
                if expired && self.remove_expired(&dir, &path, now).await? {
                    count += 1;
                }
            }
            if count > 0 {
                debug!(region = %region, count, "purged expired entries");
            }
            removed += count;
        }
        Ok(removed)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Deadline for a TTL starting now, rounded up to the next millisecond.
fn deadline(ttl: Duration) -> i64 {
    let mut millis = ttl.as_millis();
    if ttl.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    now_ms().saturating_add(i64::try_from(millis).unwrap_or(i64::MAX))
}

fn encode(value: &[u8], ttl: Option<Duration>) -> Vec<u8> {
    let raw = ttl.map(deadline).unwrap_or(0);
    let mut bytes = Vec::with_capacity(HEADER_LEN + value.len());
    bytes.extend_from_slice(&raw.to_be_bytes());
    bytes.extend_from_slice(value);
    bytes
}

fn decode(path: &Path, mut bytes: Vec<u8>) -> Result<StoredEntry> {
    if bytes.len() < HEADER_LEN {
        return Err(CacheError::SerializationFailure(format!(
            "truncated cache file {}",
            path.display()
        )));
    }
    let value = bytes.split_off(HEADER_LEN);
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&bytes);
    let raw = i64::from_be_bytes(header);
    Ok(StoredEntry {
        deadline: (raw != 0).then_some(raw),
        value,
    })
}

/// Reads and decodes an entry file; `None` if it does not exist.
async fn read_entry(path: &Path) -> Result<Option<StoredEntry>> {
    match fs::read(path).await {
        Ok(bytes) => decode(path, bytes).map(Some),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error("read", path, err)),
    }
}

/// Children of `dir` whose names decode from hex, with their decoded names.
/// Only directories are listed when `dirs` is set, only files otherwise.
async fn list_named(dir: &Path, dirs: bool) -> Result<Vec<(String, PathBuf)>> {
    let mut reader = match fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error("list", dir, err)),
    };

    let mut named = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|err| io_error("list", dir, err))?
    {
        let Some(name) = entry.file_name().to_str().and_then(decode_name) else {
            continue;
        };
        let is_dir = match entry.file_type().await {
            Ok(file_type) => file_type.is_dir(),
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_error("stat", &entry.path(), err)),
        };
        if is_dir == dirs {
            named.push((name, entry.path()));
        }
    }
    named.sort();
    Ok(named)
}

fn decode_name(name: &str) -> Option<String> {
    String::from_utf8(hex::decode(name).ok()?).ok()
}

fn temp_path(dir: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{}{}-{}", TEMP_PREFIX, std::process::id(), seq))
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove temporary cache file");
        }
    }
}

fn io_error(op: &str, path: &Path, err: std::io::Error) -> CacheError {
    CacheError::Internal(format!("failed to {} {}: {}", op, path.display(), err))
}
