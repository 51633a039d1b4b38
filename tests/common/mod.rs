//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use regioncache::cache::{RemoteClient, Value};
use regioncache::error::{CacheError, Result};

#[derive(Debug, Default)]
struct Inner {
    data: Mutex<HashMap<String, (Value, Option<Instant>)>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

/// In-memory stand-in for a remote key/value service.
///
/// Clones share state, so a test can keep a handle after moving one into a
/// backend. Writes to keys registered with [`fail_key`](Self::fail_key) return
/// `NetworkFailure`; [`set_delay`](Self::set_delay) stalls every call.
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    inner: Arc<Inner>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Native keys containing `fragment` fail every call.
    pub fn fail_key(&self, fragment: &str) {
        self.inner.failing.lock().insert(fragment.to_string());
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.inner.delay.lock() = delay;
    }

    /// Number of client calls made so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Raw view of a native key, bypassing failure injection.
    pub fn raw(&self, native: &str) -> Option<Value> {
        self.live(native)
    }

    pub fn native_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.data.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn enter(&self, key: &str) -> Result<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .inner
            .failing
            .lock()
            .iter()
            .any(|fragment| key.contains(fragment.as_str()));
        if failing {
            return Err(CacheError::NetworkFailure(format!("injected failure on {}", key)));
        }
        Ok(())
    }

    fn live(&self, key: &str) -> Option<Value> {
        let mut data = self.inner.data.lock();
        let expired = match data.get(key) {
            Some((_, Some(deadline))) => Instant::now() >= *deadline,
            Some((_, None)) => false,
            None => return None,
        };
        if expired {
            data.remove(key);
            return None;
        }
        data.get(key).map(|(value, _)| value.clone())
    }

    fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        self.inner
            .data
            .lock()
            .insert(key.to_string(), (value.to_vec(), deadline));
    }
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.enter(key).await?;
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.enter(key).await?;
        self.write(key, value, ttl);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool> {
        self.enter(key).await?;
        if self.live(key).is_some() {
            return Ok(false);
        }
        self.write(key, value, ttl);
        Ok(true)
    }

    async fn take(&self, key: &str) -> Result<Option<Value>> {
        self.enter(key).await?;
        let value = self.live(key);
        self.inner.data.lock().remove(key);
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.enter(key).await?;
        let existed = self.live(key).is_some();
        self.inner.data.lock().remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.enter(key).await?;
        Ok(self.live(key).is_some())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        self.enter("").await?;
        let candidates: Vec<String> = self.inner.data.lock().keys().cloned().collect();
        let mut keys: Vec<String> = candidates
            .into_iter()
            .filter(|key| glob_match(pattern, key) && self.live(key).is_some())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        self.enter("").await?;
        let mut data = self.inner.data.lock();
        Ok(keys.iter().filter(|key| data.remove(*key).is_some()).count())
    }

    async fn ping(&self) -> Result<()> {
        self.enter("").await
    }
}

/// Glob matching with `*`, `?` and backslash escapes.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    matches_from(&pattern, &text)
}

fn matches_from(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => (0..=text.len()).any(|skip| matches_from(&pattern[1..], &text[skip..])),
        Some('?') => !text.is_empty() && matches_from(&pattern[1..], &text[1..]),
        Some('\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && matches_from(&pattern[2..], &text[1..])
        }
        Some(ch) => text.first() == Some(ch) && matches_from(&pattern[1..], &text[1..]),
    }
}

#[test]
fn glob_match_handles_escapes() {
    assert!(glob_match("p:r:*", "p:r:key"));
    assert!(!glob_match("p:r:*", "p:rx:key"));
    assert!(glob_match("p:a\\*b:*", "p:a*b:k"));
    assert!(!glob_match("p:a\\*b:*", "p:axb:k"));
}
