use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use lens_types::Signals;

/// Per-session signal cache keyed by URL origin.
///
/// Entries expire after `ttl` and the cache holds at most `capacity`
/// origins; inserting past the bound evicts the least recently touched
/// entry. Per-session on purpose: sharing it across sessions would leak
/// stale signals between unrelated agent loops.
pub struct SignalCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

struct CacheEntry {
    signals: Signals,
    inserted: Instant,
    touched: Instant,
}

impl SignalCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, origin: &str) -> Option<Signals> {
        if let Some(mut entry) = self.entries.get_mut(origin) {
            if entry.inserted.elapsed() <= self.ttl {
                entry.touched = Instant::now();
                return Some(entry.signals.clone());
            }
        }
        self.entries.remove(origin);
        None
    }

    pub fn put(&self, origin: String, signals: Signals) {
        let now = Instant::now();
        if !self.entries.contains_key(&origin) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            origin,
            CacheEntry {
                signals,
                inserted: now,
                touched: now,
            },
        );
    }

    pub fn invalidate(&self, origin: &str) {
        self.entries.remove(origin);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().touched)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            debug!(origin = %key, "evicting least recently used signal cache entry");
            self.entries.remove(&key);
        }
    }
}
