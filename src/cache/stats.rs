//! Cache Statistics Module
//!
//! Tracks attribute-cache performance: hits, misses, store reads, evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a positive cache entry
    pub hits: u64,
    /// Lookups answered from a negative cache entry
    pub negative_hits: u64,
    /// Lookups that had to consult the persistent store
    pub misses: u64,
    /// Store lookups that found the record
    pub store_hits: u64,
    /// Number of entries evicted by the footprint bound
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Current aggregate footprint in bytes
    pub footprint: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Fraction of lookups served without touching the store.
    ///
    /// Negative hits count as hits. Returns 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.negative_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_negative_hit(&mut self) {
        self.negative_hits += 1;
    }

    /// Counts a trip to the store and whether it found the record.
    pub fn record_miss(&mut self, found_in_store: bool) {
        self.misses += 1;
        if found_in_store {
            self.store_hits += 1;
        }
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Refreshes the gauges from the cache's live state.
    pub fn set_gauges(&mut self, total_entries: usize, footprint: usize) {
        self.total_entries = total_entries;
        self.footprint = footprint;
    }
}
