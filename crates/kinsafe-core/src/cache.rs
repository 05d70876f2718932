//! In-memory TTL cache for normalized fetch results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How a single fetch interacts with the response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Read a non-expired entry if present; otherwise fetch and store. (Default)
    #[default]
    Use,
    /// Skip the read, fetch live, and store the fresh result.
    Refresh,
    /// Neither read from nor write to the cache.
    Bypass,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

#[derive(Debug)]
struct CacheInner<V> {
    map: HashMap<String, CacheEntry<V>>,
    enabled: bool,
}

/// Thread-safe keyed store where every entry carries its own TTL.
///
/// Expired entries are treated as absent and dropped on the lookup that
/// finds them; there is no background sweep and no size bound.
#[derive(Debug, Clone)]
pub struct ResponseCache<V> {
    inner: Arc<tokio::sync::RwLock<CacheInner<V>>>,
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
                enabled,
            })),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let store = self.inner.read().await;
            match store.map.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut store = self.inner.write().await;
        // Re-check: another writer may have replaced the entry in between.
        if let Some(entry) = store.map.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        store.map.remove(key);
        None
    }

    pub async fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut store = self.inner.write().await;
        if !store.enabled {
            return;
        }

        store.map.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        let mut store = self.inner.write().await;
        store.map.remove(key).map(|entry| entry.value)
    }

    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.map.clear();
    }

    /// Number of stored entries, including expired ones not yet looked up.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_disabled(&self) -> bool {
        !self.inner.read().await.enabled
    }
}
