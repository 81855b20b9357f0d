use crate::clock::{Clock, MonotonicClock};
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

struct Entry<V> {
    value: V,
    expires_at: Option<Duration>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Duration) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Key/value store with per-entry TTL and an optional capacity bound.
///
/// Expired entries are evicted lazily: by `load`, and by the purge that runs when a `store`
/// pushes the cache over capacity. Only then are live entries evicted, least recently used
/// first.
pub struct TtlCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    capacity: Option<NonZeroUsize>,
    clock: Arc<dyn Clock>,
}

impl<K: Hash + Eq, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.entries.lock().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    /// No capacity bound.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// At most `capacity` entries after each store.
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self::new(Some(capacity))
    }

    /// Optional capacity bound on the monotonic clock.
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            capacity,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    /// Use a custom clock for expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Capacity bound, if any.
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    /// Live value for `key`, marking it most recently used.
    pub fn load(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if entries.peek(key)?.is_expired(now) {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or overwrite. `ttl = None` never expires.
    pub fn store(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let expires_at = ttl.map(|ttl| now.saturating_add(ttl));
        let mut entries = self.entries.lock();
        entries.put(key, Entry { value, expires_at });

        let Some(capacity) = self.capacity else { return };
        if entries.len() <= capacity.get() {
            return;
        }
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
        while entries.len() > capacity.get() {
            entries.pop_lru();
        }
    }

    /// Remove `key`, returning its value even if expired.
    pub fn delete(&self, key: &K) -> Option<V> {
        self.entries.lock().pop(key).map(|entry| entry.value)
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Stored entries, expired ones not yet evicted included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache(capacity: Option<usize>, clock: &ManualClock) -> TtlCache<&'static str, u32> {
        TtlCache::new(capacity.and_then(NonZeroUsize::new)).with_clock(Arc::new(clock.clone()))
    }

    fn secs(n: u64) -> Option<Duration> {
        Some(Duration::from_secs(n))
    }

    #[test]
    fn load_respects_ttl_and_evicts_lazily() {
        let clock = ManualClock::new();
        let c = cache(None, &clock);
        c.store("a", 1, secs(10));
        assert_eq!(c.load(&"a"), Some(1));

        clock.advance(Duration::from_secs(10));
        assert_eq!(c.len(), 1);
        assert_eq!(c.load(&"a"), None);
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn store_overwrites_and_resets_expiry() {
        let clock = ManualClock::new();
        let c = cache(None, &clock);
        c.store("a", 1, secs(5));
        clock.advance(Duration::from_secs(4));
        c.store("a", 2, secs(5));
        clock.advance(Duration::from_secs(4));
        assert_eq!(c.load(&"a"), Some(2));
    }

    #[test]
    fn none_ttl_never_expires() {
        let clock = ManualClock::new();
        let c = cache(None, &clock);
        c.store("a", 1, None);
        clock.advance(Duration::from_secs(1_000_000));
        assert_eq!(c.load(&"a"), Some(1));
    }

    #[test]
    fn lru_eviction_honours_recent_loads() {
        let clock = ManualClock::new();
        let c = cache(Some(2), &clock);
        c.store("a", 1, secs(60));
        c.store("b", 2, secs(60));
        assert_eq!(c.load(&"a"), Some(1));
        c.store("c", 3, secs(60));

        assert_eq!(c.len(), 2);
        assert_eq!(c.load(&"b"), None);
        assert_eq!(c.load(&"a"), Some(1));
        assert_eq!(c.load(&"c"), Some(3));
    }

    #[test]
    fn expired_entries_are_purged_before_live_ones() {
        let clock = ManualClock::new();
        let c = cache(Some(2), &clock);
        c.store("long", 1, secs(60));
        c.store("short", 2, secs(1));
        clock.advance(Duration::from_secs(2));
        // "long" is least recently used, but the expired entry goes first.
        c.store("new", 3, secs(60));
        assert_eq!(c.len(), 2);
        assert_eq!(c.load(&"long"), Some(1));
        assert_eq!(c.load(&"new"), Some(3));
    }

    #[test]
    fn purge_can_free_more_than_one_slot() {
        let clock = ManualClock::new();
        let c = cache(Some(3), &clock);
        c.store("live", 0, None);
        c.store("x", 1, secs(1));
        c.store("y", 2, secs(1));
        clock.advance(Duration::from_secs(1));
        c.store("z", 3, None);
        // Both expired entries go; the least recently used live entry stays.
        assert_eq!(c.len(), 2);
        assert_eq!(c.load(&"live"), Some(0));
    }

    #[test]
    fn delete_and_clear() {
        let clock = ManualClock::new();
        let c = cache(None, &clock);
        c.store("a", 1, None);
        c.store("b", 2, None);
        assert_eq!(c.delete(&"a"), Some(1));
        assert_eq!(c.delete(&"a"), None);
        c.clear();
        assert!(c.is_empty());
    }
}
