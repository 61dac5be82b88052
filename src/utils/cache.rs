use std::{
    collections::HashMap,
    hash::Hash,
    sync::{PoisonError, RwLock},
    time::{Duration, Instant},
};

struct CacheEntry<V> {
    value: V,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Key/value cache shared between readers. Expiry is checked lazily on read.
pub(crate) struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    pub(crate) fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_live_entries() {
        let cache = TtlCache::new();
        cache.insert("projects", 3, Duration::from_secs(60));
        assert_eq!(cache.get(&"projects"), Some(3));
        assert_eq!(cache.get(&"tasks"), None);
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = TtlCache::new();
        cache.insert(1, "x", Duration::ZERO);
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn huge_ttl_never_expires() {
        let cache = TtlCache::new();
        cache.insert(2024, "holidays", Duration::MAX);
        assert_eq!(cache.get(&2024), Some("holidays"));
    }
}
