//! Response DTOs for the demo cache server
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Region label reported by the all-regions stats endpoint.
pub const ALL_REGIONS: &str = "*";

/// Response body for GET /get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub region: String,
    /// Stored bytes decoded as UTF-8, invalid sequences replaced
    pub value: String,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, region: impl Into<String>, value: &[u8]) -> Self {
        Self {
            key: key.into(),
            region: region.into(),
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }
}

/// Response body for PUT /set
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
    pub region: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, region: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            region: region.into(),
        }
    }
}

/// Response body for DELETE /del/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /keys
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub region: String,
    pub keys: Vec<String>,
    pub count: usize,
}

impl KeysResponse {
    pub fn new(region: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            region: region.into(),
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for DELETE /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub region: String,
}

impl ClearResponse {
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            message: format!("Region '{}' cleared", region),
            region,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub region: String,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(region: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            region: region.into(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }

    /// Totals across every region.
    pub fn all_regions(stats: &CacheStats) -> Self {
        Self::new(ALL_REGIONS, stats)
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// `local`, `remote` or `file`
    pub backend: String,
    /// Current timestamp in RFC 3339 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(backend: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            backend: backend.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
