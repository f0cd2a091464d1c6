use gridmap_proto::Data;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;

/// Sentinel returned to a caller that lost the race to reserve a slot.
/// Never stored in a live record.
pub const NOT_RESERVED: i64 = -2;

/// Sentinel marking a record as finalized: the payload is set and safe to
/// read concurrently.
pub const READ_PERMITTED: i64 = -1;

/// Finalized record payload. `Nil` is a confirmed server-side absence
/// (negative caching), cached so repeated lookups of a missing key do not
/// keep going to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Value(Data),
    Nil,
}

struct AccessStats {
    last_access_ms: u64,
    hit_count: u64,
}

/// One cache entry. Two independent synchronization domains:
///
/// - `reservation` + `value`: the atomic publish protocol. `value` is set
///   exactly once, immediately before the Release store of
///   `READ_PERMITTED`; readers pair it with an Acquire load.
/// - `access`: hot-path read statistics, behind their own lock so they
///   never serialize with the reserve/publish path.
pub struct Record {
    creation_ms: u64,
    expiry_ms: u64,
    access: Mutex<AccessStats>,
    reservation: AtomicI64,
    value: OnceLock<CachedValue>,
}

impl Record {
    /// A freshly reserved placeholder: no payload yet, `reservation_id` is
    /// the in-flight token owned by exactly one writer.
    pub fn reserved(now_ms: u64, ttl_ms: u64, reservation_id: i64) -> Self {
        Self {
            creation_ms: now_ms,
            expiry_ms: now_ms.saturating_add(ttl_ms),
            access: Mutex::new(AccessStats {
                last_access_ms: now_ms,
                hit_count: 0,
            }),
            reservation: AtomicI64::new(reservation_id),
            value: OnceLock::new(),
        }
    }

    pub fn reservation_id(&self) -> i64 {
        self.reservation.load(Ordering::Acquire)
    }

    /// Finalize the record. Caller must hold the matching in-flight token;
    /// the token protocol guarantees at most one publisher per record.
    pub(crate) fn publish(&self, value: CachedValue) {
        let _ = self.value.set(value);
        self.reservation.store(READ_PERMITTED, Ordering::Release);
    }

    /// Payload, if finalized. `None` for an in-flight record, or for a
    /// read-permitted record that was never given a payload (store misuse).
    pub fn value(&self) -> Option<CachedValue> {
        if self.reservation_id() != READ_PERMITTED {
            return None;
        }
        self.value.get().cloned()
    }

    pub fn cached_as_nil(&self) -> bool {
        matches!(self.value.get(), Some(CachedValue::Nil))
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expiry_ms
    }

    pub fn on_access(&self, now_ms: u64) {
        let mut access = self.access.lock();
        access.last_access_ms = now_ms;
        access.hit_count += 1;
    }

    pub fn creation_ms(&self) -> u64 {
        self.creation_ms
    }

    pub fn expiry_ms(&self) -> u64 {
        self.expiry_ms
    }

    /// Last access time without touching it. Eviction hook, same role as
    /// an LRU sampler peeking at entries.
    pub fn peek_last_access_ms(&self) -> u64 {
        self.access.lock().last_access_ms
    }

    pub fn hit_count(&self) -> u64 {
        self.access.lock().hit_count
    }
}
