//! Cache Store Module
//!
//! Bounded storage for a single region, combining HashMap storage with LRU
//! tracking and TTL expiration. The store itself is not synchronised; the
//! local backend wraps each region's store in its own lock.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker, Value};

/// Stale deadlines tolerated in the expiry queue before it is rebuilt.
const EXPIRY_QUEUE_SLACK: usize = 64;

// == Cache Store ==
/// Main cache storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Deadlines of entries with a TTL, soonest first. Pairs left behind by
    /// overwrites and removals stay until popped or compacted.
    expiries: BinaryHeap<Reverse<(Instant, String)>>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: NonZeroUsize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore holding at most `max_entries` entries.
    pub fn new(max_entries: NonZeroUsize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            expiries: BinaryHeap::new(),
            stats: CacheStats::new(),
            max_entries,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_entries.get()
    }

    // == Set ==
    /// Stores a key-value pair with optional TTL.
    ///
    /// If the key already exists, the value is replaced, the TTL is reset and
    /// the key becomes most recently used. If inserting a new key would exceed
    /// capacity, expired entries are dropped first and a live entry is evicted
    /// from the LRU tail only if the store is still full. A zero TTL removes
    /// the key instead of storing an already-dead entry.
    pub fn set(&mut self, key: &str, value: Value, ttl: Option<Duration>) {
        if ttl == Some(Duration::ZERO) {
            self.remove_entry(key);
            return;
        }

        let now = Instant::now();
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries.get() {
            self.purge_due(now);
            while self.entries.len() >= self.max_entries.get() {
                if !self.evict_one(now) {
                    break;
                }
            }
        }

        let entry = CacheEntry::new_at(value, ttl, now);
        if let Some(deadline) = entry.expires_at {
            self.expiries.push(Reverse((deadline, key.to_string())));
        }
        self.entries.insert(key.to_string(), entry);
        self.lru.touch(key);

        if self.expiries.len() > 2 * self.entries.len() + EXPIRY_QUEUE_SLACK {
            self.compact_expiries();
        }
    }

    // == Get ==
    /// Retrieves a live value by key, promoting it to most recently used.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = Instant::now();
        if self.purge_if_expired(key, now) {
            self.stats.record_lookup(false);
            return None;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                let value = entry.value.clone();
                self.lru.touch(key);
                self.stats.record_lookup(true);
                Some(value)
            }
            None => {
                self.stats.record_lookup(false);
                None
            }
        }
    }

    // == Peek ==
    /// Returns a live value without promoting it or mutating the store.
    pub fn peek(&self, key: &str) -> Option<&Value> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| &entry.value)
    }

    /// Membership test with `get` expiry semantics and no recency promotion.
    pub fn contains(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    // == Delete ==
    /// Removes an entry by key. Returns true if a live entry was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.pop(key).is_some()
    }

    // == Pop ==
    /// Removes an entry and returns its value if it was live.
    pub fn pop(&mut self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let entry = self.remove_entry(key)?;
        if entry.is_expired_at(now) {
            self.stats.record_expirations(1);
            return None;
        }
        Some(entry.value)
    }

    // == Pop LRU ==
    /// Removes and returns the least recently used live entry.
    pub fn pop_lru(&mut self) -> Option<(String, Value)> {
        let now = Instant::now();
        while let Some(key) = self.lru.evict_oldest() {
            let Some(entry) = self.entries.remove(&key) else {
                continue;
            };
            if entry.is_expired_at(now) {
                self.stats.record_expirations(1);
                continue;
            }
            return Some((key, entry.value));
        }
        None
    }

    // == Set Default ==
    /// Returns the live value for `key`, inserting `default` if there is none.
    pub fn setdefault(&mut self, key: &str, default: Value, ttl: Option<Duration>) -> Value {
        if let Some(existing) = self.get(key) {
            return existing;
        }
        self.set(key, default.clone(), ttl);
        default
    }

    // == Clear ==
    /// Removes every entry. Returns the number of entries dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.expiries.clear();
        count
    }

    // == Snapshots ==
    /// Live keys, least recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.items().into_iter().map(|(key, _)| key).collect()
    }

    /// Live values, least recently used first.
    pub fn values(&self) -> Vec<Value> {
        self.items().into_iter().map(|(_, value)| value).collect()
    }

    /// Live entries, least recently used first.
    pub fn items(&self) -> Vec<(String, Value)> {
        let now = Instant::now();
        self.lru
            .iter_oldest_first()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .filter(|entry| !entry.is_expired_at(now))
                    .map(|entry| (key.to_string(), entry.value.clone()))
            })
            .collect()
    }

    // == Stats ==
    /// Returns current cache statistics, counting only live entries.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let live = self
            .entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count();
        self.stats.with_entries(live)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        self.purge_due(Instant::now())
    }

    // == Length ==
    /// Number of live entries; expired entries are purged first.
    pub fn live_len(&mut self) -> usize {
        self.cleanup_expired();
        self.entries.len()
    }

    /// Number of physically stored entries, possibly including expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        Some(entry)
    }

    /// Pops every deadline at or before `now` and removes the entries that
    /// still carry it. Returns the number of entries removed.
    fn purge_due(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(Reverse((deadline, _))) = self.expiries.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((deadline, key))) = self.expiries.pop() else {
                break;
            };
            let current = self
                .entries
                .get(&key)
                .is_some_and(|entry| entry.expires_at == Some(deadline));
            if current {
                self.remove_entry(&key);
                removed += 1;
            }
        }
        self.stats.record_expirations(removed);
        removed
    }

    fn compact_expiries(&mut self) {
        self.expiries = self
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                entry
                    .expires_at
                    .map(|deadline| Reverse((deadline, key.clone())))
            })
            .collect();
    }

    fn purge_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
        }
        expired
    }

    /// Drops the LRU tail. Returns false when nothing was left to drop.
    fn evict_one(&mut self, now: Instant) -> bool {
        let Some(key) = self.lru.evict_oldest() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            if entry.is_expired_at(now) {
                self.stats.record_expirations(1);
            } else {
                debug!(key = %key, "evicted least recently used entry");
                self.stats.record_eviction();
            }
        }
        true
    }
}
