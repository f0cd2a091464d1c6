use gridmap_nearcache::{
    CachedValue, NearCache, NearCacheConfig, StringCodec, SubscriptionState, NOT_RESERVED,
};
use gridmap_proto::{
    decode_subscription_payload, encode_invalidation_payload, BatchInvalidation, Data,
    InvalidationEvent, Opcode, SingleInvalidation,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

fn cache() -> NearCache<String> {
    NearCache::new(NearCacheConfig::new("products"), Arc::new(StringCodec)).unwrap()
}

fn plain_key_cache() -> NearCache<String> {
    let mut cfg = NearCacheConfig::new("products");
    cfg.serialize_keys = false;
    NearCache::new(cfg, Arc::new(StringCodec)).unwrap()
}

fn data(v: &[u8]) -> Data {
    Data::from(v)
}

fn single_event(key: &str) -> InvalidationEvent {
    InvalidationEvent::Single(SingleInvalidation {
        key: data(key.as_bytes()),
        source: Uuid::new_v4(),
        partition: Uuid::new_v4(),
        sequence: 1,
    })
}

fn batch_event(keys: &[&str]) -> InvalidationEvent {
    InvalidationEvent::Batch(BatchInvalidation {
        keys: keys.iter().map(|k| data(k.as_bytes())).collect(),
        sources: keys.iter().map(|_| Uuid::new_v4()).collect(),
        partitions: keys.iter().map(|_| Uuid::new_v4()).collect(),
        sequences: (0..keys.len() as i64).collect(),
    })
}

fn fill(cache: &NearCache<String>, key: &str, value: &[u8]) {
    let token = cache.try_reserve_for_update(&key.to_string()).unwrap();
    assert!(token > 0, "expected a fresh reservation for {key}");
    cache
        .try_publish_reserved(&key.to_string(), Some(data(value)), token)
        .unwrap();
}

#[test]
fn test_miss_then_reserve_publish_hit() {
    let cache = cache();
    let key = "p:1".to_string();

    assert!(cache.get(&key).unwrap().is_none());
    fill(&cache, &key, b"v1");
    assert_eq!(
        cache.get(&key).unwrap(),
        Some(CachedValue::Value(data(b"v1")))
    );

    let snap = cache.stats();
    assert_eq!(snap.misses_total, 1);
    assert_eq!(snap.hits_total, 1);
}

#[test]
fn test_second_reserver_backs_off_while_open() {
    let cache = cache();
    let key = "p:1".to_string();
    let t1 = cache.try_reserve_for_update(&key).unwrap();
    assert!(t1 > 0);
    assert_eq!(cache.try_reserve_for_update(&key).unwrap(), NOT_RESERVED);
}

#[test]
fn test_local_invalidate_mid_reservation_discards_fetch() {
    let cache = cache();
    let key = "p:1".to_string();
    let t1 = cache.try_reserve_for_update(&key).unwrap();
    cache.invalidate(&key).unwrap();

    let published = cache
        .try_publish_reserved(&key, Some(data(b"stale")), t1)
        .unwrap();
    assert!(published.is_none());
    assert!(cache.get(&key).unwrap().is_none());
}

#[test]
fn test_registration_requests_carry_subscription_id() {
    let cache = cache();
    let reg = cache.invalidation_listener();

    // frame: [u32 len][u8 opcode][payload]
    assert_eq!(reg.add_request[4], Opcode::AddInvalidationListener as u8);
    assert_eq!(
        reg.remove_request[4],
        Opcode::RemoveInvalidationListener as u8
    );

    let req = decode_subscription_payload(&reg.add_request[5..]).unwrap();
    assert_eq!(req.cache_name, "products");
    assert_eq!(req.subscription_id, reg.subscription_id);
    assert_eq!(reg.handler.subscription_id(), reg.subscription_id);
}

#[test]
fn test_subscription_state_transitions() {
    let cache = cache();
    let reg = cache.invalidation_listener();
    assert_eq!(reg.handler.state(), SubscriptionState::Unsubscribed);
    reg.handler.mark_subscribed();
    assert_eq!(reg.handler.state(), SubscriptionState::Subscribed);
    reg.handler.mark_unsubscribed();
    assert_eq!(reg.handler.state(), SubscriptionState::Unsubscribed);
}

#[test]
fn test_single_invalidation_evicts_exactly_that_key() {
    let cache = cache();
    fill(&cache, "p:1", b"v1");
    fill(&cache, "p:2", b"v2");

    let reg = cache.invalidation_listener();
    reg.handler.handle_event(single_event("p:1"));

    assert!(cache.get(&"p:1".to_string()).unwrap().is_none());
    assert_eq!(
        cache.get(&"p:2".to_string()).unwrap(),
        Some(CachedValue::Value(data(b"v2")))
    );
}

#[test]
fn test_invalidation_is_idempotent_on_duplicates() {
    let cache = cache();
    fill(&cache, "p:1", b"v1");
    let reg = cache.invalidation_listener();
    reg.handler.handle_event(single_event("p:1"));
    reg.handler.handle_event(single_event("p:1"));
    reg.handler.handle_event(single_event("never-cached"));
    assert!(cache.is_empty());
}

#[test]
fn test_invalidation_maps_plain_keys_through_codec() {
    let cache = plain_key_cache();
    fill(&cache, "p:1", b"v1");

    let reg = cache.invalidation_listener();
    reg.handler.handle_event(single_event("p:1"));
    assert!(cache.get(&"p:1".to_string()).unwrap().is_none());
}

#[test]
fn test_batch_invalidation_evicts_listed_keys() {
    let cache = cache();
    fill(&cache, "p:1", b"v1");
    fill(&cache, "p:2", b"v2");
    fill(&cache, "p:3", b"v3");

    let reg = cache.invalidation_listener();
    reg.handler.handle_event(batch_event(&["p:1", "p:3"]));

    assert!(cache.get(&"p:1".to_string()).unwrap().is_none());
    assert!(cache.get(&"p:3".to_string()).unwrap().is_none());
    assert_eq!(
        cache.get(&"p:2".to_string()).unwrap(),
        Some(CachedValue::Value(data(b"v2")))
    );
}

#[test]
fn test_empty_batch_clears_everything() {
    let cache = cache();
    for i in 0..5 {
        fill(&cache, &format!("p:{i}"), b"v");
    }
    let reg = cache.invalidation_listener();
    reg.handler.handle_event(batch_event(&[]));

    assert!(cache.is_empty());
    for i in 0..5 {
        assert!(cache.get(&format!("p:{i}")).unwrap().is_none());
    }
}

#[test]
fn test_server_event_beats_inflight_reservation() {
    let cache = cache();
    let key = "p:1".to_string();
    let t1 = cache.try_reserve_for_update(&key).unwrap();

    let reg = cache.invalidation_listener();
    reg.handler.handle_event(single_event("p:1"));

    let published = cache
        .try_publish_reserved(&key, Some(data(b"stale")), t1)
        .unwrap();
    assert!(published.is_none());
    assert!(cache.get(&key).unwrap().is_none());
}

#[test]
fn test_handle_frame_decodes_and_applies() {
    let cache = cache();
    fill(&cache, "p:1", b"v1");
    let reg = cache.invalidation_listener();

    let payload = encode_invalidation_payload(&single_event("p:1"));
    reg.handler.handle_frame(&payload).unwrap();
    assert!(cache.get(&"p:1".to_string()).unwrap().is_none());

    assert!(reg.handler.handle_frame(&[0xffu8]).is_err());
}

#[test_log::test(tokio::test)]
async fn test_run_loop_applies_pushed_events() {
    let cache = cache();
    fill(&cache, "p:1", b"v1");
    let reg = cache.invalidation_listener();
    reg.handler.mark_subscribed();

    let (tx, rx) = broadcast::channel(16);
    let handler = Arc::clone(&reg.handler);
    let task = tokio::spawn(async move { handler.run(rx).await });

    tx.send(single_event("p:1")).unwrap();
    for _ in 0..100 {
        if cache.get(&"p:1".to_string()).unwrap().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(cache.get(&"p:1".to_string()).unwrap().is_none());

    // Closing the bus ends the loop and drops the subscription.
    drop(tx);
    task.await.unwrap();
    assert_eq!(reg.handler.state(), SubscriptionState::Unsubscribed);
}

#[test_log::test(tokio::test)]
async fn test_run_loop_clears_cache_on_lag() {
    let cache = cache();
    fill(&cache, "p:1", b"v1");
    fill(&cache, "p:2", b"v2");
    let reg = cache.invalidation_listener();

    // Capacity-1 bus with the receiver subscribed before any send: the
    // second and third sends overwrite, so the first recv reports Lagged.
    let (tx, rx) = broadcast::channel(1);
    for _ in 0..3 {
        tx.send(single_event("unrelated")).unwrap();
    }
    drop(tx);

    reg.handler.run(rx).await;
    assert!(cache.is_empty());
}
