use rustc_hash::FxHashMap;
use std::sync::{PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};
use tracing::trace;

struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL is too large to represent
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

fn purge<V>(entries: &mut FxHashMap<String, CacheEntry<V>>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    let purged = before - entries.len();
    if purged > 0 {
        trace!(purged, "Purged expired cache entries");
    }
    purged
}

/// In-memory key-value store whose entries expire after a per-entry TTL.
///
/// Expiry is lazy: an expired entry reads as absent and is removed by whichever `get`
/// notices it, if the write lock is free at that moment. No background thread is involved.
pub struct ExpiringCache<V> {
    entries: RwLock<FxHashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        purge(&mut entries, now);
        entries.insert(key.into(), CacheEntry { value, expires_at });
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        self.evict_if_expired(key, now);
        None
    }

    /// Removes `key` if it is still expired, without waiting on a busy lock.
    fn evict_if_expired(&self, key: &str, now: Instant) {
        let mut entries = match self.entries.try_write() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                trace!(key, "Cache busy, deferring eviction");
                return;
            }
        };
        // a concurrent set may have refreshed the entry since the read lock was dropped
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            trace!(key, "Evicted expired cache entry");
        }
    }

    pub fn delete(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    /// Removes every expired entry and returns how many were dropped.
    ///
    /// `set` calls this too, so evictions `get` had to skip under contention are
    /// picked up by the next write.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        purge(&mut entries, Instant::now())
    }

    /// Number of stored entries, including expired ones not yet evicted.
    ///
    /// A `get` that finds an expired entry while the lock is busy leaves it in place, so
    /// under heavy reads this can exceed the number of live entries until the next `set`
    /// or [`purge_expired`](Self::purge_expired).
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for ExpiringCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn get_returns_value_before_expiry() {
        let cache = ExpiringCache::new();
        cache.set("example.com", true, Duration::from_secs(60));
        assert_eq!(cache.get("example.com"), Some(true));
    }

    #[test]
    fn get_missing_key() {
        let cache: ExpiringCache<bool> = ExpiringCache::new();
        assert_eq!(cache.get("nothing"), None);
    }

    #[test]
    fn expired_entry_is_absent_and_evicted() {
        let cache = ExpiringCache::new();
        cache.set("k", true, Duration::from_millis(1));
        thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn set_after_expiry_refreshes() {
        let cache = ExpiringCache::new();
        cache.set("k", 1, Duration::from_millis(1));
        thread::sleep(Duration::from_millis(20));
        cache.set("k", 2, Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn delete_and_clear() {
        let cache = ExpiringCache::new();
        cache.set("a", "x".to_string(), Duration::from_secs(60));
        cache.set("b", "y".to_string(), Duration::from_secs(60));

        cache.delete("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some("y".to_string()));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_skipped_under_contention_is_picked_up_later() {
        let cache = ExpiringCache::new();
        cache.set("stale", true, Duration::from_millis(1));
        thread::sleep(Duration::from_millis(20));

        {
            // a concurrent reader keeps the write lock unavailable
            let _reader = cache.entries.read().unwrap();
            thread::scope(|s| {
                s.spawn(|| assert_eq!(cache.get("stale"), None));
            });
        }
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_sweeps_expired_entries() {
        let cache = ExpiringCache::new();
        cache.set("a", 1, Duration::from_millis(1));
        cache.set("b", 2, Duration::from_millis(1));
        thread::sleep(Duration::from_millis(20));

        cache.set("c", 3, Duration::from_secs(60));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        let cache = ExpiringCache::new();
        cache.set("k", true, Duration::MAX);
        assert_eq!(cache.get("k"), Some(true));
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = Arc::new(ExpiringCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("key{}", i % 20);
                        if (i + t) % 3 == 0 {
                            cache.set(key, i, Duration::from_millis(2));
                        } else if let Some(v) = cache.get(&key) {
                            assert!(v < 200);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        thread::sleep(Duration::from_millis(20));
        for i in 0..20 {
            assert_eq!(cache.get(&format!("key{i}")), None);
        }
    }
}
