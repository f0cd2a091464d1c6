use crate::config::NearCacheConfig;
use crate::error::NearCacheError;
use crate::invalidation::{InvalidationListener, ListenerRegistration};
use crate::record::CachedValue;
use crate::stats::StatsSnapshot;
use crate::store::RecordStore;
use gridmap_proto::{
    encode_request, encode_subscription_payload, Data, Opcode, SubscriptionReq,
};
use std::hash::Hash;
use std::sync::Arc;
use uuid::Uuid;

/// Seam to the serialization service. `to_data` yields the canonical byte
/// form the server hashes keys by; `from_data` is the reverse mapping, used
/// to route invalidation events when keys are stored unserialized.
pub trait KeyCodec<K>: Send + Sync {
    fn to_data(&self, key: &K) -> Result<Data, NearCacheError>;
    fn from_data(&self, data: &Data) -> Result<K, NearCacheError>;
}

/// `KeyCodec` over plain UTF-8 strings.
pub struct StringCodec;

impl KeyCodec<String> for StringCodec {
    fn to_data(&self, key: &String) -> Result<Data, NearCacheError> {
        Ok(Data::new(key.clone().into_bytes()))
    }

    fn from_data(&self, data: &Data) -> Result<String, NearCacheError> {
        std::str::from_utf8(data.as_bytes())
            .map(str::to_string)
            .map_err(|e| NearCacheError::KeyCodec(e.to_string()))
    }
}

/// Owned store slot identity: either the client key itself or its
/// canonical serialized form, depending on the cache's key mode.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey<K> {
    Plain(K),
    Data(Data),
}

/// Public-facing near cache owned by a map proxy. Wraps one record store;
/// the proxy fills misses by pairing `try_reserve_for_update` with
/// `try_publish_reserved` around its remote fetch.
pub struct NearCache<K> {
    name: String,
    serialize_keys: bool,
    local_only: bool,
    codec: Arc<dyn KeyCodec<K>>,
    store: Arc<RecordStore<CacheKey<K>>>,
}

impl<K> NearCache<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(cfg: NearCacheConfig, codec: Arc<dyn KeyCodec<K>>) -> Result<Self, NearCacheError> {
        cfg.validate()?;
        Ok(Self {
            name: cfg.name,
            serialize_keys: cfg.serialize_keys,
            local_only: cfg.local_only,
            codec,
            store: Arc::new(RecordStore::new(cfg.default_ttl_ms)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &K) -> Result<Option<CachedValue>, NearCacheError> {
        let slot = self.cache_key(key)?;
        self.store.get(&slot)
    }

    pub fn try_reserve_for_update(&self, key: &K) -> Result<i64, NearCacheError> {
        let slot = self.cache_key(key)?;
        Ok(self.store.try_reserve_for_update(slot))
    }

    pub fn try_publish_reserved(
        &self,
        key: &K,
        value: Option<Data>,
        reservation_id: i64,
    ) -> Result<Option<CachedValue>, NearCacheError> {
        let slot = self.cache_key(key)?;
        Ok(self.store.try_publish_reserved(&slot, value, reservation_id))
    }

    /// Local removal, used by the owning proxy on its own writes so a read
    /// after a write never sees the pre-write value from the cache.
    pub fn invalidate(&self, key: &K) -> Result<(), NearCacheError> {
        let slot = self.cache_key(key)?;
        self.store.invalidate(&slot);
        Ok(())
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn remove_expired(&self) -> usize {
        self.store.remove_expired()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.store.stats().snapshot()
    }

    /// Build the server-push subscription for this cache: a generated
    /// subscription id, the encoded add/remove requests the connection
    /// layer sends, and the handler it feeds decoded push frames to.
    pub fn invalidation_listener(&self) -> ListenerRegistration<K> {
        let subscription_id = Uuid::new_v4();
        let req = SubscriptionReq {
            cache_name: self.name.clone(),
            subscription_id,
            local_only: self.local_only,
        };
        let body = encode_subscription_payload(&req);
        let add_request = encode_request(Opcode::AddInvalidationListener, &body);
        let remove_request = encode_request(Opcode::RemoveInvalidationListener, &body);
        let handler = Arc::new(InvalidationListener::new(
            subscription_id,
            Arc::clone(&self.store),
            self.serialize_keys,
            Arc::clone(&self.codec),
        ));
        ListenerRegistration {
            subscription_id,
            add_request,
            remove_request,
            handler,
        }
    }

    fn cache_key(&self, key: &K) -> Result<CacheKey<K>, NearCacheError> {
        if self.serialize_keys {
            Ok(CacheKey::Data(self.codec.to_data(key)?))
        } else {
            Ok(CacheKey::Plain(key.clone()))
        }
    }
}
