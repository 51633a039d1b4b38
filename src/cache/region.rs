//! Region Module
//!
//! Named, isolated key namespaces. A region carries identity only; backends
//! decide how the namespace is materialised (a separate store per region
//! locally, a key prefix remotely).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CacheError, Result};

/// Name of the region used when a caller does not name one.
pub const DEFAULT_REGION: &str = "DEFAULT";

// == Region ==
/// A validated, case-sensitive region name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(Arc<str>);

impl Region {
    /// Validates an explicit region name.
    ///
    /// Explicit names must be non-empty; case is preserved and significant.
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(CacheError::InvalidRegion(
                "region name cannot be empty".to_string(),
            ));
        }
        Ok(Self(Arc::from(name)))
    }

    /// Resolves an optional caller-supplied name against a fallback region.
    pub fn resolve(name: Option<&str>, fallback: &Region) -> Result<Self> {
        match name {
            Some(name) => Self::new(name),
            None => Ok(fallback.clone()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Region {
    fn default() -> Self {
        Self(Arc::from(DEFAULT_REGION))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Region {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// == Region Registry ==
/// Table of independent per-region stores.
///
/// Each region gets its own lock so bookkeeping in one region never contends
/// with another. The table lock is only held while looking up or creating a
/// region handle, never for the duration of a cache operation.
#[derive(Debug)]
pub struct RegionRegistry<S> {
    regions: RwLock<HashMap<Region, Arc<RwLock<S>>>>,
}

impl<S> RegionRegistry<S> {
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the store for `region` if it has been materialised.
    pub fn get(&self, region: &Region) -> Option<Arc<RwLock<S>>> {
        self.regions.read().get(region).cloned()
    }

    /// Returns the store for `region`, creating it with `init` on first use.
    pub fn get_or_create(&self, region: &Region, init: impl FnOnce() -> S) -> Arc<RwLock<S>> {
        if let Some(store) = self.get(region) {
            return store;
        }
        let mut regions = self.regions.write();
        regions
            .entry(region.clone())
            .or_insert_with(|| Arc::new(RwLock::new(init())))
            .clone()
    }

    /// Materialises `region` with `store` unless it already exists.
    ///
    /// The check and the insert happen under one write lock. Returns false,
    /// dropping `store`, when the region was already present.
    pub fn insert_new(&self, region: &Region, store: S) -> bool {
        let mut regions = self.regions.write();
        if regions.contains_key(region) {
            return false;
        }
        regions.insert(region.clone(), Arc::new(RwLock::new(store)));
        true
    }

    /// Snapshot of every materialised region handle.
    pub fn all(&self) -> Vec<(Region, Arc<RwLock<S>>)> {
        self.regions
            .read()
            .iter()
            .map(|(region, store)| (region.clone(), store.clone()))
            .collect()
    }

    /// Number of materialised regions.
    pub fn len(&self) -> usize {
        self.regions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.read().is_empty()
    }
}

impl<S> Default for RegionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creates_once() {
        let registry: RegionRegistry<Vec<u32>> = RegionRegistry::new();
        let region = Region::new("r1").unwrap();

        let first = registry.get_or_create(&region, || vec![1]);
        first.write().push(2);

        let second = registry.get_or_create(&region, || vec![99]);
        assert_eq!(*second.read(), vec![1, 2]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_regions_independent() {
        let registry: RegionRegistry<Vec<u32>> = RegionRegistry::new();
        let r1 = Region::new("r1").unwrap();
        let r2 = Region::new("r2").unwrap();

        registry.get_or_create(&r1, Vec::new).write().push(1);
        assert!(registry.get_or_create(&r2, Vec::new).read().is_empty());
        assert!(registry.get(&Region::new("r3").unwrap()).is_none());
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_insert_new_only_once() {
        let registry: RegionRegistry<Vec<u32>> = RegionRegistry::new();
        let region = Region::new("r1").unwrap();

        assert!(registry.insert_new(&region, vec![1]));
        assert!(!registry.insert_new(&region, vec![2]));
        assert_eq!(*registry.get_or_create(&region, Vec::new).read(), vec![1]);
    }

    #[test]
    fn test_insert_new_racing_threads_single_winner() {
        let registry: Arc<RegionRegistry<u32>> = Arc::new(RegionRegistry::new());
        let region = Region::new("contested").unwrap();

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let registry = registry.clone();
                let region = region.clone();
                std::thread::spawn(move || registry.insert_new(&region, i))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_default_region() {
        assert_eq!(Region::default().as_str(), DEFAULT_REGION);
    }

    #[test]
    fn test_empty_region_rejected() {
        assert!(matches!(Region::new(""), Err(CacheError::InvalidRegion(_))));
    }

    #[test]
    fn test_region_case_sensitive() {
        let lower = Region::new("users").unwrap();
        let upper = Region::new("Users").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_resolve_falls_back() {
        let fallback = Region::new("sessions").unwrap();
        assert_eq!(Region::resolve(None, &fallback).unwrap(), fallback);
        assert_eq!(
            Region::resolve(Some("other"), &fallback).unwrap().as_str(),
            "other"
        );
        assert!(Region::resolve(Some(""), &fallback).is_err());
    }
}
