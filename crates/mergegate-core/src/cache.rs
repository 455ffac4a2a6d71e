//! Explicit TTL cache.
//!
//! Passed by reference into whichever component needs memoised lookups,
//! with explicit capacity, TTL and eviction. No hidden module-level state,
//! so runner behavior stays deterministic across runs.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Bounded map whose entries expire after a fixed TTL.
///
/// When full, inserting evicts the oldest entry (by insertion time).
#[derive(Debug)]
pub struct TtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Get a live entry, if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let (inserted_at, value) = self.entries.get(key)?;
        if inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(value.clone())
    }

    /// Insert, evicting expired entries first and then the oldest entry
    /// if still at capacity.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.retain(|_, (at, _)| at.elapsed() <= self.ttl);
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (at, _))| *at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, (Instant::now(), value));
    }

    /// Memoised lookup: return the cached value or compute, store and
    /// return a fresh one.
    pub fn get_or_insert_with(&mut self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
