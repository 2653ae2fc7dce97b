//! Read-through cache regions for the service layer.
//!
//! Each entity type gets one named region ("notes", "users"). A region maps
//! semantic keys to either a single entity (id lookups) or a result list
//! (the fixed all-key and parameterized lookups). Keys transition
//! independently; a cache write is not atomic with the store write, so a
//! reader can observe a value that is stale relative to a concurrent
//! mutation. Last write wins.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Semantic cache key within a region.
///
/// `Lookup` values carry a parameter-space prefix ("title:", "user:", ...)
/// so lookups by different parameters can never collide with each other or
/// with entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The fixed key for "all entities".
    All,
    /// A single entity keyed by its id.
    Id(i64),
    /// A parameterized lookup, keyed by the prefixed parameter value.
    Lookup(String),
}

/// A cached result: one entity for id keys, a list for everything else.
#[derive(Debug, Clone)]
pub enum Cached<T> {
    One(T),
    Many(Vec<T>),
}

/// The cache interface injected into services.
pub trait EntityCache<T>: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Cached<T>>;
    fn put(&self, key: CacheKey, value: Cached<T>);
    fn evict(&self, key: &CacheKey);
}

/// LRU-bounded in-memory region.
pub struct LruRegion<T> {
    region: &'static str,
    store: Mutex<LruCache<CacheKey, Cached<T>>>,
}

impl<T> LruRegion<T> {
    /// Panics if `capacity` is 0.
    pub fn new(region: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("cache capacity must be > 0");
        Self {
            region,
            store: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl<T: Clone + Send> EntityCache<T> for LruRegion<T> {
    fn get(&self, key: &CacheKey) -> Option<Cached<T>> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let hit = store.get(key).cloned();
        tracing::debug!(region = self.region, ?key, hit = hit.is_some(), "cache get");
        hit
    }

    fn put(&self, key: CacheKey, value: Cached<T>) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(region = self.region, ?key, "cache put");
        store.put(key, value);
    }

    fn evict(&self, key: &CacheKey) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        if store.pop(key).is_some() {
            tracing::debug!(region = self.region, ?key, "cache evict");
        }
    }
}
