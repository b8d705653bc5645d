//! Statistics tracked by a [`crate::MemoCache`].

/// Snapshot of cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups answered from the store.
    pub hits: u64,
    /// Number of lookups that did not find the key in the store.
    pub misses: u64,
    /// Number of computations that produced no value.
    pub not_found: u64,
}

impl CacheStats {
    /// Total number of lookups that reached the store.
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Calculate hit rate (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
