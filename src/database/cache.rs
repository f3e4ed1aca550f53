//! Row-count cache.
//!
//! Totals of unfiltered listings are memoized per entity. Entries expire after a sliding TTL
//! and the least recently used entry is evicted once the capacity is reached. Whoever mutates
//! an entity (create/delete) is responsible for calling [`CountCache::invalidate`].

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::EngineConfig;

/// Cache provider for total row counts.
pub trait CountCache: Send + Sync {
    fn get(&self, key: &str) -> Option<u64>;

    fn insert(&self, key: &str, count: u64);

    fn invalidate(&self, key: &str);
}

struct CountEntry {
    count: u64,
    last_access: Instant,
}

/// In-process [`CountCache`] with sliding expiration and a bounded number of entries.
pub struct RowCountCache {
    entries: DashMap<String, CountEntry>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl RowCountCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.count_cache_ttl, config.count_cache_capacity)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn evict_one(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_access)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            tracing::debug!(key = %key, "row count evicted");
        }
    }
}

impl std::fmt::Debug for RowCountCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCountCache")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for RowCountCache {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl CountCache for RowCountCache {
    fn get(&self, key: &str) -> Option<u64> {
        let expired = match self.entries.get_mut(key) {
            Some(mut entry) => {
                if entry.last_access.elapsed() <= self.ttl {
                    entry.last_access = Instant::now();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.count);
                }
                true
            }
            None => false,
        };
        // the shard guard is released before removing
        if expired {
            self.entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn insert(&self, key: &str, count: u64) {
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.entries.insert(
            key.to_string(),
            CountEntry {
                count,
                last_access: Instant::now(),
            },
        );
    }

    fn invalidate(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            tracing::debug!(key = %key, "row count invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_insert() {
        let cache = RowCountCache::default();
        assert_eq!(cache.get("Order"), None);
        cache.insert("Order", 25);
        assert_eq!(cache.get("Order"), Some(25));
        assert_eq!(cache.stats(), CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[test]
    fn test_invalidate() {
        let cache = RowCountCache::default();
        cache.insert("Order", 25);
        cache.invalidate("Order");
        assert_eq!(cache.get("Order"), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = RowCountCache::new(Duration::ZERO, 10);
        cache.insert("Order", 25);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get("Order"), None);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = RowCountCache::new(Duration::from_secs(60), 2);
        cache.insert("A", 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("B", 2);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get("A"), Some(1));
        cache.insert("C", 3);
        assert_eq!(cache.get("B"), None);
        assert_eq!(cache.get("A"), Some(1));
        assert_eq!(cache.get("C"), Some(3));
    }
}
