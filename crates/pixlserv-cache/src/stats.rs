//! Cache counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache activity since startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    /// Hits whose last-access refresh failed
    pub refresh_failures: u64,
    /// Images persisted without a cache record
    pub orphaned_writes: u64,
}

/// Live counters shared by the writer and reader
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    refresh_failures: AtomicU64,
    orphaned_writes: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn orphaned_write(&self) {
        self.orphaned_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            orphaned_writes: self.orphaned_writes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.refresh_failures, 0);
        assert_eq!(stats.orphaned_writes, 0);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = CacheCounters::default();
        counters.hit();
        counters.hit();
        counters.miss();
        counters.write();
        counters.refresh_failure();

        let stats = counters.snapshot();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.refresh_failures, 1);
        assert_eq!(stats.orphaned_writes, 0);
    }

    #[test]
    fn test_cache_stats_serialization() {
        let stats = CacheStats {
            hits: 500,
            misses: 50,
            writes: 40,
            refresh_failures: 1,
            orphaned_writes: 0,
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"hits\":500"));
        assert!(json.contains("\"refresh_failures\":1"));
    }
}
