// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded TTL map.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

/// A concurrent map whose entries expire after their TTL.
///
/// Reads past an entry's TTL miss and evict it. Inserting beyond `max_size`
/// evicts the entry with the earliest `created_at`.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, Entry<V>>,
    max_size: usize,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_size: max_size.max(1),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the value if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
            debug!(key, "cache entry expired");
        }
        None
    }

    /// Like [`get`](Self::get), returning `default` on a miss.
    pub fn get_or(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Stores a value with the cache's default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
        while self.entries.len() > self.max_size {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live entries whose key starts with `prefix`.
    pub fn scan_prefix(&self, prefix: &str) -> Vec<(String, V)> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_expired(now))
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect()
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().created_at)
            .map(|e| e.key().clone());
        match oldest {
            Some(key) => {
                debug!(key, "cache full, evicting oldest entry");
                self.entries.remove(&key).is_some()
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_then_get_within_ttl() {
        let cache = TtlCache::new(10, Duration::from_secs(60));
        cache.set("k", 7);
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k"), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_read_misses_and_evicts() {
        let cache = TtlCache::new(10, Duration::from_secs(60));
        cache.set("k", 7);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get_or("k", -1), -1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn per_entry_ttl_overrides_default() {
        let cache = TtlCache::new(10, Duration::from_secs(60));
        cache.set_with_ttl("short", 1, Duration::from_secs(1));
        cache.set("long", 2);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_evicts_earliest_created() {
        let cache = TtlCache::new(2, Duration::from_secs(60));
        cache.set("a", 1);
        tokio::time::advance(Duration::from_millis(5)).await;
        cache.set("b", 2);
        tokio::time::advance(Duration::from_millis(5)).await;
        cache.set("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let cache = TtlCache::new(10, Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn scan_prefix_filters_keys() {
        let cache = TtlCache::new(10, Duration::from_secs(60));
        cache.set("search\u{1f}laptop", 1);
        cache.set("fetch\u{1f}https://a", 2);
        let hits = cache.scan_prefix("search\u{1f}");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, 1);
    }
}
