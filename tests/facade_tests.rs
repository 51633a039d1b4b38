//! Blocking and async facades over the local backend.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use regioncache::cache::{AsyncCache, Cache, LocalBackend, Region};
use regioncache::error::CacheError;
use regioncache::keys::{build_key, KeyArg};

fn local(max_entries: usize) -> Arc<LocalBackend> {
    Arc::new(LocalBackend::new(NonZeroUsize::new(max_entries).unwrap(), None))
}

fn blocking(max_entries: usize) -> Cache {
    Cache::new(local(max_entries)).unwrap()
}

// == Blocking Facade ==

#[test]
fn test_round_trip_and_overwrite() {
    let cache = blocking(8);

    cache.set("k", b"one".to_vec(), None, None).unwrap();
    cache.set("k", b"two".to_vec(), None, None).unwrap();

    assert_eq!(cache.get("k", None).unwrap(), Some(b"two".to_vec()));
    assert_eq!(cache.len(None).unwrap(), 1);
}

#[test]
fn test_lru_eviction_respects_reads() {
    let cache = blocking(2);

    cache.set("a", b"1".to_vec(), None, None).unwrap();
    cache.set("b", b"2".to_vec(), None, None).unwrap();
    // Reading "a" makes "b" the eviction candidate
    cache.get("a", None).unwrap();
    cache.set("c", b"3".to_vec(), None, None).unwrap();

    assert!(cache.contains("a", None).unwrap());
    assert!(!cache.contains("b", None).unwrap());
    assert!(cache.contains("c", None).unwrap());
    assert_eq!(cache.stats(None).unwrap().evictions, 1);
}

#[test]
fn test_contains_does_not_refresh_recency() {
    let cache = blocking(2);

    cache.set("a", b"1".to_vec(), None, None).unwrap();
    cache.set("b", b"2".to_vec(), None, None).unwrap();
    assert!(cache.contains_key("a").unwrap());
    cache.set("c", b"3".to_vec(), None, None).unwrap();

    assert!(!cache.contains_key("a").unwrap());
}

#[test]
fn test_regions_have_independent_capacity() {
    let cache = blocking(1);

    cache.set("k", b"users".to_vec(), None, Some("users")).unwrap();
    cache.set("k", b"orders".to_vec(), None, Some("orders")).unwrap();

    assert_eq!(cache.get("k", Some("users")).unwrap(), Some(b"users".to_vec()));
    assert_eq!(cache.get("k", Some("orders")).unwrap(), Some(b"orders".to_vec()));
    assert_eq!(cache.get("k", None).unwrap(), None);
}

#[test]
fn test_region_names_are_case_sensitive() {
    let cache = blocking(4);

    cache.set("k", b"v".to_vec(), None, Some("Users")).unwrap();
    assert_eq!(cache.get("k", Some("users")).unwrap(), None);
    assert!(matches!(
        cache.get("k", Some("")),
        Err(CacheError::InvalidRegion(_))
    ));
}

#[test]
fn test_ttl_expiry() {
    let cache = blocking(4);

    cache
        .set("short", b"v".to_vec(), Some(Duration::from_millis(30)), None)
        .unwrap();
    cache.set("long", b"v".to_vec(), None, None).unwrap();

    thread::sleep(Duration::from_millis(60));

    assert_eq!(cache.get("short", None).unwrap(), None);
    assert!(!cache.contains("short", None).unwrap());
    let keys: Vec<String> = cache.keys(None).unwrap().collect();
    assert_eq!(keys, vec!["long".to_string()]);
    assert_eq!(cache.len(None).unwrap(), 1);
}

#[test]
fn test_expired_entries_make_room_before_live_ones() {
    let cache = blocking(3);
    let short = Some(Duration::from_millis(30));

    cache.set("keep", b"1".to_vec(), None, None).unwrap();
    cache.set("brief1", b"2".to_vec(), short, None).unwrap();
    cache.set("brief2", b"3".to_vec(), short, None).unwrap();
    thread::sleep(Duration::from_millis(60));

    cache.set("new1", b"4".to_vec(), None, None).unwrap();
    cache.set("new2", b"5".to_vec(), None, None).unwrap();

    let keys: Vec<String> = cache.keys(None).unwrap().collect();
    assert_eq!(keys, vec!["keep", "new1", "new2"]);
    let stats = cache.stats(None).unwrap();
    assert_eq!(stats.evictions, 0);
    assert_eq!(stats.expirations, 2);
    assert_eq!(stats.total_entries, 3);

    // Now genuinely full: the LRU live entry goes
    cache.set("new3", b"6".to_vec(), None, None).unwrap();
    assert!(!cache.contains("keep", None).unwrap());
    assert_eq!(cache.stats(None).unwrap().evictions, 1);
}

#[test]
fn test_clear_against_concurrent_writer() {
    let cache = Arc::new(blocking(4096));
    let total = 1000;

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for i in 0..total {
                cache
                    .set(&format!("k{:04}", i), b"v".to_vec(), None, Some("race"))
                    .unwrap();
            }
        })
    };
    for _ in 0..20 {
        cache.clear(Some("race")).unwrap();
        thread::sleep(Duration::from_micros(200));
    }
    writer.join().unwrap();

    let keys: Vec<String> = cache.keys(Some("race")).unwrap().collect();
    assert_eq!(keys.len(), cache.len(Some("race")).unwrap());
    if let Some(first) = keys.first() {
        let start: usize = first[1..].parse().unwrap();
        let expected: Vec<String> = (start..total).map(|i| format!("k{:04}", i)).collect();
        assert_eq!(keys, expected);
    }
}

#[test]
fn test_stats_all_across_regions() {
    let cache = blocking(4);

    cache.set("a", b"1".to_vec(), None, Some("r1")).unwrap();
    cache.set("b", b"2".to_vec(), None, Some("r2")).unwrap();
    cache.get("a", Some("r1")).unwrap();
    cache.get("zz", Some("r2")).unwrap();

    let total = cache.stats_all().unwrap();
    assert_eq!(total.total_entries, 2);
    assert_eq!(total.hits, 1);
    assert_eq!(total.misses, 1);
}

#[test]
fn test_default_ttl_from_backend() {
    let backend = LocalBackend::new(
        NonZeroUsize::new(4).unwrap(),
        Some(Duration::from_millis(30)),
    );
    let cache = Cache::new(Arc::new(backend)).unwrap();

    cache.set("k", b"v".to_vec(), None, None).unwrap();
    cache
        .set("pinned", b"v".to_vec(), Some(Duration::from_secs(3600)), None)
        .unwrap();
    thread::sleep(Duration::from_millis(60));

    assert_eq!(cache.get("k", None).unwrap(), None);
    assert!(cache.contains("pinned", None).unwrap());
}

#[test]
fn test_indexing_helpers() {
    let cache = blocking(4);

    assert_eq!(
        cache.item("missing"),
        Err(CacheError::KeyNotFound("missing".to_string()))
    );

    cache.set_item("k", b"v".to_vec()).unwrap();
    assert_eq!(cache.item("k").unwrap(), b"v".to_vec());
    assert_eq!(cache.iter().unwrap().collect::<Vec<_>>(), vec!["k".to_string()]);

    cache.del_item("k").unwrap();
    assert_eq!(
        cache.del_item("k"),
        Err(CacheError::KeyNotFound("k".to_string()))
    );
}

#[test]
fn test_default_region_override() {
    let cache = blocking(4).with_default_region("sessions").unwrap();

    cache.set_item("k", b"v".to_vec()).unwrap();
    assert_eq!(cache.default_region().as_str(), "sessions");
    assert_eq!(cache.get("k", Some("sessions")).unwrap(), Some(b"v".to_vec()));
    assert_eq!(cache.get("k", Some("DEFAULT")).unwrap(), None);
}

#[test]
fn test_pop_semantics() {
    let cache = blocking(4);

    cache.set("k", b"v".to_vec(), None, None).unwrap();
    assert_eq!(cache.pop("k", None, None).unwrap(), b"v".to_vec());
    assert_eq!(
        cache.pop("k", Some(b"d".to_vec()), None).unwrap(),
        b"d".to_vec()
    );
    assert_eq!(
        cache.pop("k", None, None),
        Err(CacheError::KeyNotFound("k".to_string()))
    );
}

#[test]
fn test_popitem_returns_least_recent() {
    let cache = blocking(4);

    cache.set("a", b"1".to_vec(), None, None).unwrap();
    cache.set("b", b"2".to_vec(), None, None).unwrap();
    cache.get("a", None).unwrap();

    assert_eq!(cache.popitem(None).unwrap(), ("b".to_string(), b"2".to_vec()));
    assert_eq!(cache.popitem(None).unwrap(), ("a".to_string(), b"1".to_vec()));
    assert!(matches!(cache.popitem(None), Err(CacheError::EmptyCache(_))));
}

#[test]
fn test_update_and_snapshots() {
    let cache = blocking(8);

    cache
        .update(vec![("a", b"1".to_vec()), ("b", b"2".to_vec())], None, None)
        .unwrap();

    let items: Vec<(String, Vec<u8>)> = cache.items(None).unwrap().collect();
    assert_eq!(
        items,
        vec![
            ("a".to_string(), b"1".to_vec()),
            ("b".to_string(), b"2".to_vec())
        ]
    );
    let values: Vec<Vec<u8>> = cache.values(None).unwrap().collect();
    assert_eq!(values, vec![b"1".to_vec(), b"2".to_vec()]);

    // Snapshots are detached from later writes
    let keys = cache.keys(None).unwrap();
    cache.clear(None).unwrap();
    assert_eq!(keys.count(), 2);
    assert!(cache.is_empty(None).unwrap());
}

#[test]
fn test_clear_is_region_scoped() {
    let cache = blocking(8);

    cache.set("k", b"v".to_vec(), None, Some("a")).unwrap();
    cache.set("k", b"v".to_vec(), None, Some("b")).unwrap();

    cache.clear(Some("a")).unwrap();
    assert!(cache.is_empty(Some("a")).unwrap());
    assert_eq!(cache.len(Some("b")).unwrap(), 1);

    cache.clear_all().unwrap();
    assert!(cache.is_empty(Some("b")).unwrap());
}

#[test]
fn test_concurrent_setdefault_single_winner() {
    let cache = Arc::new(blocking(64));

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.setdefault("shared", vec![i], None, None).unwrap())
        })
        .collect();

    let results: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let stored = cache.get("shared", None).unwrap().unwrap();
    assert!(results.iter().all(|value| *value == stored));
}

#[test]
fn test_memoization_with_built_keys() {
    let cache = blocking(16);
    let mut computed = 0;

    for _ in 0..3 {
        let key = build_key(
            "square",
            &[KeyArg::from(12)],
            &[("precise", KeyArg::from(true))],
        )
        .unwrap();
        if cache.get(&key, Some("memo")).unwrap().is_none() {
            computed += 1;
            cache
                .set(&key, (12u32 * 12).to_be_bytes().to_vec(), None, Some("memo"))
                .unwrap();
        }
    }

    assert_eq!(computed, 1);
    assert_eq!(cache.stats(Some("memo")).unwrap().hits, 2);
}

// == Async Facade ==

#[tokio::test]
async fn test_async_matches_blocking_semantics() {
    let cache = AsyncCache::new(local(2));

    cache.set("a", b"1".to_vec(), None, None).await.unwrap();
    cache.set("b", b"2".to_vec(), None, None).await.unwrap();
    cache.get("a", None).await.unwrap();
    cache.set("c", b"3".to_vec(), None, None).await.unwrap();

    let keys: Vec<String> = cache.keys(None).await.unwrap().collect();
    assert_eq!(keys, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(
        cache.item("b").await,
        Err(CacheError::KeyNotFound("b".to_string()))
    );
}

#[tokio::test]
async fn test_async_shares_backend_with_clones() {
    let cache = AsyncCache::new(local(8));
    let other = cache.clone();

    cache.set_item("k", b"v".to_vec()).await.unwrap();
    assert_eq!(other.item("k").await.unwrap(), b"v".to_vec());
    assert!(!other.is_remote());
}

#[tokio::test]
async fn test_async_concurrent_setdefault() {
    let cache = AsyncCache::new(local(8));

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.setdefault("shared", vec![i], None, None).await.unwrap()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_configured_region_capacity() {
    let backend = local(8);
    let small = Region::new("small").unwrap();
    backend
        .configure_region(&small, NonZeroUsize::new(1).unwrap())
        .unwrap();
    let cache = AsyncCache::new(backend);

    cache.set("a", b"1".to_vec(), None, Some("small")).await.unwrap();
    cache.set("b", b"2".to_vec(), None, Some("small")).await.unwrap();
    cache.set("a", b"1".to_vec(), None, None).await.unwrap();
    cache.set("b", b"2".to_vec(), None, None).await.unwrap();

    assert_eq!(cache.len(Some("small")).await.unwrap(), 1);
    assert_eq!(cache.len(None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_purge_expired_counts_all_regions() {
    let cache = AsyncCache::new(local(8));
    let ttl = Some(Duration::from_millis(20));

    cache.set("a", b"1".to_vec(), ttl, Some("r1")).await.unwrap();
    cache.set("b", b"2".to_vec(), ttl, Some("r2")).await.unwrap();
    cache.set("c", b"3".to_vec(), None, Some("r2")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.purge_expired().await.unwrap(), 2);
    assert_eq!(cache.stats(Some("r2")).await.unwrap().expirations, 1);
}
