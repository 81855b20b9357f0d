//! Registry of caches shared across all clients of a class.
//!
//! A registry is never created implicitly: inject one with
//! [`ClientBuilder::cache_registry`](crate::ClientBuilder::cache_registry) or install one
//! process-wide with [`CacheRegistry::install`].

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::cache::{ResponseCache, TtlCache};
use crate::client::ClassId;
use crate::clock::{Clock, MonotonicClock};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::warn;

static GLOBAL: OnceCell<CacheRegistry> = OnceCell::new();

type CacheKey = (ClassId, String);

/// Shared caches keyed by class identity and endpoint name. Clones share the same map.
#[derive(Clone, Debug)]
pub struct CacheRegistry {
    inner: Arc<RwLock<HashMap<CacheKey, Arc<ResponseCache>>>>,
    clock: Arc<dyn Clock>,
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheRegistry {
    /// Empty registry on the monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::default()))
    }

    /// Empty registry whose caches expire entries by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), clock }
    }

    /// Install as the process-wide registry. Only the first install succeeds; later calls get
    /// their registry back.
    pub fn install(self) -> Result<(), CacheRegistry> {
        GLOBAL.set(self)
    }

    /// The process-wide registry, if one was installed.
    pub fn global() -> Option<&'static CacheRegistry> {
        GLOBAL.get()
    }

    /// Cache for `(class, endpoint)`, created with `capacity` on first use.
    ///
    /// The capacity of an existing cache is left untouched.
    pub fn get_or_create(
        &self,
        class: ClassId,
        endpoint: &str,
        capacity: Option<NonZeroUsize>,
    ) -> Arc<ResponseCache> {
        let key = (class, endpoint.to_string());
        if let Some(cache) = self.inner.read().get(&key) {
            return cache.clone();
        }
        self.inner
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(TtlCache::new(capacity).with_clock(self.clock.clone())))
            .clone()
    }

    /// Cache for `(class, endpoint)` if it exists.
    pub fn get(&self, class: ClassId, endpoint: &str) -> Option<Arc<ResponseCache>> {
        self.inner.read().get(&(class, endpoint.to_string())).cloned()
    }

    /// Register a cache, replacing any existing one for the same key.
    ///
    /// Replacement drops the old cache's entries for every client of the class.
    pub fn register(&self, class: ClassId, endpoint: &str, cache: Arc<ResponseCache>) {
        let mut map = self.inner.write();
        if map.insert((class, endpoint.to_string()), cache).is_some() {
            warn!(
                target: "tether::cache_registry",
                class = class.name(),
                endpoint,
                "shared cache replaced; last registration wins"
            );
        }
    }

    /// Remove the cache for `(class, endpoint)`.
    pub fn remove(&self, class: ClassId, endpoint: &str) -> Option<Arc<ResponseCache>> {
        self.inner.write().remove(&(class, endpoint.to_string()))
    }

    /// Number of registered caches.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True if no cache is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Clear every registered cache's entries.
    pub fn clear(&self) {
        for cache in self.inner.read().values() {
            cache.clear();
        }
    }
}
