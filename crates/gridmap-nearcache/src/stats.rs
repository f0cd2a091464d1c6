use crate::time::now_ms;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic counters, one block per record store. Read-only
/// to the stats collaborator; the store is the only writer.
pub struct NearCacheStats {
    start_ms: u64,
    hits_total: AtomicU64,
    misses_total: AtomicU64,
    expirations_total: AtomicU64,
    invalidations_total: AtomicU64,
}

impl NearCacheStats {
    pub fn new() -> Self {
        Self {
            start_ms: now_ms(),
            hits_total: AtomicU64::new(0),
            misses_total: AtomicU64::new(0),
            expirations_total: AtomicU64::new(0),
            invalidations_total: AtomicU64::new(0),
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        now_ms().saturating_sub(self.start_ms)
    }

    pub fn inc_hit(&self) {
        self.hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_miss(&self) {
        self.misses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_expiration(&self) {
        self.expirations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_invalidations(&self, n: u64) {
        self.invalidations_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_ms: self.uptime_ms(),
            hits_total: self.hits_total.load(Ordering::Relaxed),
            misses_total: self.misses_total.load(Ordering::Relaxed),
            expirations_total: self.expirations_total.load(Ordering::Relaxed),
            invalidations_total: self.invalidations_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for NearCacheStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub uptime_ms: u64,
    pub hits_total: u64,
    pub misses_total: u64,
    pub expirations_total: u64,
    pub invalidations_total: u64,
}

impl StatsSnapshot {
    /// Cache hit rate (0.0 - 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits_total + self.misses_total;
        if total == 0 {
            0.0
        } else {
            (self.hits_total as f64 / total as f64) * 100.0
        }
    }
}
