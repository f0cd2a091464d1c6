//! Client-side near cache for a gridmap map proxy.
//!
//! Keeps a local mirror of remote map entries so reads skip the network.
//! Misses are filled through a reservation protocol (reserve a slot, fetch
//! the authoritative value, publish it), and server-pushed invalidation
//! events evict entries the moment the backing map changes.

pub mod config;
pub mod error;
pub mod invalidation;
pub mod near_cache;
pub mod record;
pub mod stats;
pub mod store;
mod time;

pub use config::NearCacheConfig;
pub use error::NearCacheError;
pub use invalidation::{InvalidationListener, ListenerRegistration, SubscriptionState};
pub use near_cache::{CacheKey, KeyCodec, NearCache, StringCodec};
pub use record::{CachedValue, Record, NOT_RESERVED, READ_PERMITTED};
pub use stats::{NearCacheStats, StatsSnapshot};
pub use store::RecordStore;
