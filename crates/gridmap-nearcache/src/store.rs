use crate::error::NearCacheError;
use crate::record::{CachedValue, Record, NOT_RESERVED, READ_PERMITTED};
use crate::stats::NearCacheStats;
use crate::time::now_ms;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gridmap_proto::Data;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Concurrent key -> record mapping implementing the reservation protocol.
///
/// No global lock: per-key coordination is the shard-level insert-if-absent
/// plus the atomic reservation tag on each record. Nothing here touches the
/// network; the owning map proxy fetches between reserve and publish.
pub struct RecordStore<K> {
    records: DashMap<K, Arc<Record>>,
    reservation_seq: AtomicI64,
    default_ttl_ms: u64,
    stats: NearCacheStats,
}

impl<K: Eq + Hash> RecordStore<K> {
    pub fn new(default_ttl_ms: u64) -> Self {
        Self {
            records: DashMap::new(),
            reservation_seq: AtomicI64::new(0),
            default_ttl_ms,
            stats: NearCacheStats::new(),
        }
    }

    /// Local lookup. Misses (absent key, in-flight reservation, expired
    /// record) are `Ok(None)`, not errors. An expired record counts one
    /// expiration and is dropped from the mapping on the way out.
    pub fn get(&self, key: &K) -> Result<Option<CachedValue>, NearCacheError> {
        let now = now_ms();
        let record = match self.records.get(key) {
            Some(r) => Arc::clone(&*r),
            None => {
                self.stats.inc_miss();
                return Ok(None);
            }
        };
        if record.reservation_id() != READ_PERMITTED {
            // Still being populated by the reservation owner.
            self.stats.inc_miss();
            return Ok(None);
        }
        if record.is_expired(now) {
            self.stats.inc_expiration();
            // Only drop the exact record we saw expire; a fresh reservation
            // may already have replaced it in the slot.
            self.records.remove_if(key, |_, r| Arc::ptr_eq(r, &record));
            return Ok(None);
        }
        let value = record.value().ok_or(NearCacheError::FormatMismatch)?;
        record.on_access(now);
        self.stats.inc_hit();
        Ok(Some(value))
    }

    /// Unconditionally drop the key's mapping. Idempotent; in-flight
    /// reservations are dropped too, stranding their eventual publish.
    pub fn invalidate(&self, key: &K) {
        if self.records.remove(key).is_some() {
            self.stats.inc_invalidations(1);
        }
    }

    /// Full wipe. Empty-batch invalidation and lag recovery land here.
    pub fn clear(&self) {
        let n = self.records.len() as u64;
        self.records.clear();
        self.stats.inc_invalidations(n);
    }

    /// Try to become the exclusive writer for `key`. Returns a fresh
    /// reservation token if the slot was empty or held a finalized record
    /// (updates are new reservations, never in-place). Returns
    /// `NOT_RESERVED` if another writer's reservation is still open.
    pub fn try_reserve_for_update(&self, key: K) -> i64 {
        let now = now_ms();
        match self.records.entry(key) {
            Entry::Vacant(slot) => {
                let id = self.next_reservation_id();
                slot.insert(Arc::new(Record::reserved(now, self.default_ttl_ms, id)));
                id
            }
            Entry::Occupied(mut slot) => {
                if slot.get().reservation_id() == READ_PERMITTED {
                    let id = self.next_reservation_id();
                    slot.insert(Arc::new(Record::reserved(now, self.default_ttl_ms, id)));
                    id
                } else {
                    NOT_RESERVED
                }
            }
        }
    }

    /// Finalize the reservation identified by `reservation_id`. `None` as
    /// value caches the key as confirmed-absent.
    ///
    /// Returns `None` when there is nothing to publish: the key was
    /// invalidated while the caller was fetching, or a different
    /// reservation is still populating the slot. If the slot was already
    /// refreshed and finalized by someone else, the fresher value is
    /// returned instead of overwriting it with this caller's fetch.
    pub fn try_publish_reserved(
        &self,
        key: &K,
        value: Option<Data>,
        reservation_id: i64,
    ) -> Option<CachedValue> {
        let record = match self.records.get(key) {
            Some(r) => Arc::clone(&*r),
            None => return None,
        };
        let current = record.reservation_id();
        if current != reservation_id {
            if current != READ_PERMITTED {
                return None;
            }
            return record.value();
        }
        let value = match value {
            Some(data) => CachedValue::Value(data),
            None => CachedValue::Nil,
        };
        record.publish(value.clone());
        Some(value)
    }

    /// Drop records whose TTL has passed. This includes in-flight
    /// reservations: a reservation older than the default TTL was never
    /// published and would otherwise shadow its key forever. Its stranded
    /// publish lands in the "key no longer present" branch.
    pub fn remove_expired(&self) -> usize {
        let now = now_ms();
        let before = self.records.len();
        self.records.retain(|_, r| !r.is_expired(now));
        let removed = before.saturating_sub(self.records.len());
        for _ in 0..removed {
            self.stats.inc_expiration();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> &NearCacheStats {
        &self.stats
    }

    fn next_reservation_id(&self) -> i64 {
        self.reservation_seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}
