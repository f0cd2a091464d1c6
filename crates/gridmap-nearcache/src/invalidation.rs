use crate::near_cache::{CacheKey, KeyCodec};
use crate::store::RecordStore;
use bytes::BytesMut;
use gridmap_proto::{
    decode_invalidation_payload, BatchInvalidation, Data, InvalidationEvent, ProtoError,
    SingleInvalidation,
};
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Everything the connection layer needs to wire one cache's subscription:
/// send `add_request`, feed decoded push frames to `handler`, and send
/// `remove_request` on teardown.
pub struct ListenerRegistration<K> {
    pub subscription_id: Uuid,
    pub add_request: BytesMut,
    pub remove_request: BytesMut,
    pub handler: Arc<InvalidationListener<K>>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed,
}

/// Applies server-pushed invalidation events to the record store.
///
/// Invalidation always wins over in-flight reservations: removing the slot
/// strands any pending publish for it, which then lands in the
/// "key no longer present" branch and discards its fetch.
pub struct InvalidationListener<K> {
    subscription_id: Uuid,
    store: Arc<RecordStore<CacheKey<K>>>,
    serialize_keys: bool,
    codec: Arc<dyn KeyCodec<K>>,
    state: Mutex<SubscriptionState>,
}

impl<K> InvalidationListener<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        subscription_id: Uuid,
        store: Arc<RecordStore<CacheKey<K>>>,
        serialize_keys: bool,
        codec: Arc<dyn KeyCodec<K>>,
    ) -> Self {
        Self {
            subscription_id,
            store,
            serialize_keys,
            codec,
            state: Mutex::new(SubscriptionState::Unsubscribed),
        }
    }

    pub fn subscription_id(&self) -> Uuid {
        self.subscription_id
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    /// Driven by the connection layer once the add request is acked.
    pub fn mark_subscribed(&self) {
        *self.state.lock() = SubscriptionState::Subscribed;
    }

    /// Driven on explicit removal or connection loss. Re-registration after
    /// a reconnect is the connection layer's job.
    pub fn mark_unsubscribed(&self) {
        *self.state.lock() = SubscriptionState::Unsubscribed;
    }

    /// Decode one push-event payload and apply it.
    pub fn handle_frame(&self, payload: &[u8]) -> Result<(), ProtoError> {
        let event = decode_invalidation_payload(payload)?;
        self.handle_event(event);
        Ok(())
    }

    pub fn handle_event(&self, event: InvalidationEvent) {
        match event {
            InvalidationEvent::Single(ev) => self.on_single(ev),
            InvalidationEvent::Batch(ev) => self.on_batch(ev),
        }
    }

    /// Consume events from the transport's push bus until it closes.
    /// Duplicate and out-of-order delivery are fine; removal is idempotent.
    pub async fn run(&self, mut rx: broadcast::Receiver<InvalidationEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle_event(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Missed invalidations mean unknown stale entries; the
                    // only safe recovery is a full wipe.
                    tracing::warn!(
                        subscription = %self.subscription_id,
                        missed,
                        "invalidation stream lagged, clearing near cache"
                    );
                    self.store.clear();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        self.mark_unsubscribed();
    }

    fn on_single(&self, ev: SingleInvalidation) {
        tracing::trace!(
            subscription = %self.subscription_id,
            sequence = ev.sequence,
            "single invalidation"
        );
        self.invalidate_data_key(&ev.key);
    }

    fn on_batch(&self, ev: BatchInvalidation) {
        if ev.keys.is_empty() {
            // Empty key list is the protocol's "invalidate everything".
            tracing::debug!(subscription = %self.subscription_id, "batch clear-all");
            self.store.clear();
            return;
        }
        tracing::trace!(
            subscription = %self.subscription_id,
            keys = ev.keys.len(),
            "batch invalidation"
        );
        for key in &ev.keys {
            self.invalidate_data_key(key);
        }
    }

    fn invalidate_data_key(&self, data: &Data) {
        let slot = if self.serialize_keys {
            CacheKey::Data(data.clone())
        } else {
            match self.codec.from_data(data) {
                Ok(key) => CacheKey::Plain(key),
                Err(err) => {
                    // Cannot tell which local slot this maps to; serving a
                    // possibly-stale entry is worse than a cold cache.
                    tracing::warn!(%err, "undecodable invalidation key, clearing near cache");
                    self.store.clear();
                    return;
                }
            }
        };
        self.store.invalidate(&slot);
    }
}
