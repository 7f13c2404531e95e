//! Kernel cache implementation
//!
//! Provides an LRU cache of kernel matrix rows for the decomposition solver.
//! Every pair update reads two full rows of Q, so rows are the unit of caching.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::rc::Rc;

/// A cached row of the (signed) kernel matrix
pub type KernelRow = Rc<[f64]>;

/// LRU cache for kernel matrix rows
pub struct KernelCache {
    rows: LruCache<usize, KernelRow>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new kernel cache holding at most `capacity` rows
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(2)).unwrap_or(NonZeroUsize::MIN);
        Self {
            rows: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Create a kernel cache sized from a memory budget in bytes
    ///
    /// Always keeps room for the two rows of the working pair.
    pub fn with_memory_limit(memory_bytes: usize, row_len: usize) -> Self {
        let row_bytes = (row_len.max(1) * std::mem::size_of::<f64>()).max(1);
        Self::new(memory_bytes / row_bytes)
    }

    /// Get row `i`, computing it with `compute` on a miss
    pub fn get_or_compute<F>(&mut self, i: usize, compute: F) -> KernelRow
    where
        F: FnOnce() -> Vec<f64>,
    {
        if let Some(row) = self.rows.get(&i) {
            self.hits += 1;
            return Rc::clone(row);
        }

        self.misses += 1;
        let row: KernelRow = compute().into();
        self.rows.put(i, Rc::clone(&row));
        row
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.rows.cap().get(),
            size: self.rows.len(),
        }
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.rows.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_cache_hits_and_misses() {
        let mut cache = KernelCache::new(4);

        let row = cache.get_or_compute(0, || vec![1.0, 2.0]);
        assert_eq!(&*row, &[1.0, 2.0]);
        assert_eq!(cache.stats().misses, 1);

        // Second access must not recompute
        let row = cache.get_or_compute(0, || panic!("row should be cached"));
        assert_eq!(&*row, &[1.0, 2.0]);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn test_row_cache_lru_eviction() {
        let mut cache = KernelCache::new(2);

        cache.get_or_compute(0, || vec![0.0]);
        cache.get_or_compute(1, || vec![1.0]);
        cache.get_or_compute(2, || vec![2.0]); // Evicts row 0

        let mut recomputed = false;
        cache.get_or_compute(0, || {
            recomputed = true;
            vec![0.0]
        });
        assert!(recomputed);
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn test_memory_limit_keeps_working_pair() {
        let cache = KernelCache::with_memory_limit(8, 1000);
        assert_eq!(cache.stats().capacity, 2);

        let cache = KernelCache::with_memory_limit(8 * 1000 * 10, 1000);
        assert_eq!(cache.stats().capacity, 10);
    }

    #[test]
    fn test_cache_clear() {
        let mut cache = KernelCache::new(10);
        cache.get_or_compute(3, || vec![3.0]);
        cache.clear();

        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 0);
    }
}
