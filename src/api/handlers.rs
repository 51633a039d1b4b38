//! API Handlers
//!
//! HTTP request handlers for each demo server endpoint. Every handler goes
//! through [`AsyncCache`], so the server behaves the same over either backend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::{AsyncCache, Backend, Region};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    validate_key, ClearResponse, DeleteResponse, GetResponse, HealthResponse, KeysResponse,
    RegionQuery, SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// `AsyncCache` is cheap to clone and already synchronised per region, so no
/// outer lock is needed.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: AsyncCache,
}

impl AppState {
    pub fn new(cache: AsyncCache) -> Self {
        Self { cache }
    }

    /// Builds the configured backend and wraps it in a facade.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let backend = config.build_backend().await?;
        Ok(Self::new(AsyncCache::new(backend)))
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        self.cache.backend().clone()
    }

    /// Region name echoed back to the client.
    fn region_name(&self, region: Option<&str>) -> Result<String> {
        Ok(Region::resolve(region, self.cache.default_region())?.to_string())
    }
}

fn check_key(key: &str) -> Result<()> {
    match validate_key(key) {
        Some(message) => Err(CacheError::InvalidRequest(message)),
        None => Ok(()),
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair with an optional TTL in seconds.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let region = state.region_name(req.region.as_deref())?;
    let ttl = req.ttl.map(Duration::from_secs);
    state
        .cache
        .set(&req.key, req.value.into_bytes(), ttl, Some(&region))
        .await?;

    Ok(Json(SetResponse::new(req.key, region)))
}

/// Handler for GET /get/:key
///
/// A miss is reported as 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<GetResponse>> {
    check_key(&key)?;
    let region = state.region_name(query.as_deref())?;
    let value = state
        .cache
        .get(&key, Some(&region))
        .await?
        .ok_or_else(|| CacheError::KeyNotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, region, &value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<DeleteResponse>> {
    check_key(&key)?;
    if !state.cache.delete(&key, query.as_deref()).await? {
        return Err(CacheError::KeyNotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<KeysResponse>> {
    let region = state.region_name(query.as_deref())?;
    let keys = state.cache.keys(Some(&region)).await?.collect();

    Ok(Json(KeysResponse::new(region, keys)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<ClearResponse>> {
    let region = state.region_name(query.as_deref())?;
    state.cache.clear(Some(&region)).await?;

    Ok(Json(ClearResponse::new(region)))
}

/// Handler for GET /stats
pub async fn stats_handler(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<StatsResponse>> {
    let region = state.region_name(query.as_deref())?;
    let stats = state.cache.stats(Some(&region)).await?;

    Ok(Json(StatsResponse::new(region, &stats)))
}

/// Handler for GET /stats/all
///
/// Reports counters and live entries summed over every region.
pub async fn stats_all_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.cache.stats_all().await?;

    Ok(Json(StatsResponse::all_regions(&stats)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.backend().kind().as_str()))
}
