//! Datastore operation counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for backend round trips and revision cache behavior
#[derive(Debug)]
pub struct StoreMetrics {
    // Revision metrics
    clock_reads: AtomicU64,
    revision_cache_hits: AtomicU64,
    revision_cache_misses: AtomicU64,

    // Transaction metrics
    transactions_begun: AtomicU64,
    transactions_released: AtomicU64,
    cleanup_failures: AtomicU64,

    // Query metrics
    queries_executed: AtomicU64,
    query_errors: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self {
            clock_reads: AtomicU64::new(0),
            revision_cache_hits: AtomicU64::new(0),
            revision_cache_misses: AtomicU64::new(0),
            transactions_begun: AtomicU64::new(0),
            transactions_released: AtomicU64::new(0),
            cleanup_failures: AtomicU64::new(0),
            queries_executed: AtomicU64::new(0),
            query_errors: AtomicU64::new(0),
        }
    }

    /// Record a read of the backend clock
    pub fn record_clock_read(&self) {
        self.clock_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record whether an optimized revision was served from cache
    pub fn record_revision_lookup(&self, cache_hit: bool) {
        if cache_hit {
            self.revision_cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.revision_cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_transaction_begun(&self) {
        self.transactions_begun.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transaction release and whether its cleanup failed
    pub fn record_transaction_released(&self, cleanup_failed: bool) {
        self.transactions_released.fetch_add(1, Ordering::Relaxed);
        if cleanup_failed {
            self.cleanup_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a query against the backend
    pub fn record_query(&self, error: bool) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
        if error {
            self.query_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            clock_reads: self.clock_reads.load(Ordering::Relaxed),
            revision_cache_hits: self.revision_cache_hits.load(Ordering::Relaxed),
            revision_cache_misses: self.revision_cache_misses.load(Ordering::Relaxed),
            transactions_begun: self.transactions_begun.load(Ordering::Relaxed),
            transactions_released: self.transactions_released.load(Ordering::Relaxed),
            cleanup_failures: self.cleanup_failures.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            query_errors: self.query_errors.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.clock_reads.store(0, Ordering::Relaxed);
        self.revision_cache_hits.store(0, Ordering::Relaxed);
        self.revision_cache_misses.store(0, Ordering::Relaxed);
        self.transactions_begun.store(0, Ordering::Relaxed);
        self.transactions_released.store(0, Ordering::Relaxed);
        self.cleanup_failures.store(0, Ordering::Relaxed);
        self.queries_executed.store(0, Ordering::Relaxed);
        self.query_errors.store(0, Ordering::Relaxed);
    }
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub clock_reads: u64,
    pub revision_cache_hits: u64,
    pub revision_cache_misses: u64,
    pub transactions_begun: u64,
    pub transactions_released: u64,
    pub cleanup_failures: u64,
    pub queries_executed: u64,
    pub query_errors: u64,
}

impl MetricsSnapshot {
    /// Transactions begun but not yet released
    pub fn open_transactions(&self) -> u64 {
        self.transactions_begun.saturating_sub(self.transactions_released)
    }
}
