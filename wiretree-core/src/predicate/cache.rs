//! Compiled-predicate cache.
//!
//! Filter segments are evaluated once per candidate node, so the same
//! expression text is compiled over and over during a single path query.
//! Compiled predicates are kept here, keyed by their source text, and the
//! least recently used entries are dropped when the cache is full.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::Predicate;
use crate::error::PredicateError;

/// Default number of cached expressions.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache (0.0 when unused).
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry {
    predicate: Arc<Predicate>,
    last_access: AtomicU64,
}

/// Thread-safe LRU cache of compiled predicates.
pub struct ExpressionCache {
    capacity: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Monotonic counter for LRU ordering
    access_counter: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ExpressionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::with_capacity(capacity.min(1024))),
            access_counter: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the compiled predicate for `source`, compiling it on a miss.
    ///
    /// Compilation errors are not cached.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<Predicate>, PredicateError> {
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(source) {
                entry
                    .last_access
                    .store(self.access_counter.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.predicate.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let predicate = Arc::new(Predicate::compile(source)?);

        let mut entries = self.entries.write();
        if entries.len() >= self.capacity && !entries.contains_key(source) {
            self.evict_lru(&mut entries);
        }
        let order = self.access_counter.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            source.to_string(),
            CacheEntry {
                predicate: predicate.clone(),
                last_access: AtomicU64::new(order),
            },
        );
        Ok(predicate)
    }

    /// Drop the oldest ~10% of entries (at least one).
    fn evict_lru(&self, entries: &mut HashMap<String, CacheEntry>) {
        let to_remove = (self.capacity / 10).max(1).min(entries.len());

        let mut access_orders: Vec<_> = entries
            .iter()
            .map(|(source, entry)| (source.clone(), entry.last_access.load(Ordering::Relaxed)))
            .collect();
        access_orders.sort_by_key(|&(_, order)| order);

        for (source, _) in access_orders.into_iter().take(to_remove) {
            entries.remove(&source);
        }
        trace!(evicted = to_remove, "expression cache eviction");
        self.evictions.fetch_add(to_remove as u64, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Reset statistics counters (keeps cache contents).
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
