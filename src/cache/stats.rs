//! Cache Statistics Module
//!
//! Per-region counters for lookups, evictions and expirations.

use serde::Serialize;

/// Point-in-time counters for one region.
///
/// `total_entries` is filled in when a snapshot is taken; the running
/// counters never track it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Lookups that found nothing live, including expired entries
    pub misses: u64,
    /// Live entries dropped to make room
    pub evictions: u64,
    /// Entries removed after their TTL elapsed
    pub expirations: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of these counters reporting `entries` stored entries.
    pub fn with_entries(mut self, entries: usize) -> Self {
        self.total_entries = entries;
        self
    }

    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// hits / lookups, or 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            lookups => self.hits as f64 / lookups as f64,
        }
    }

    pub fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    /// Folds another region's counters into this one.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.evictions += other.evictions;
        self.expirations += other.expirations;
        self.total_entries += other.total_entries;
    }
}
