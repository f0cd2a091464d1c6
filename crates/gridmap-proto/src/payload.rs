use crate::{Data, EventType, Opcode, ProtoError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// Server-pushed notification that a single key was written or deleted on
/// the backing map. Source/partition/sequence identify the origin of the
/// mutation; they are carried for staleness detection but not interpreted
/// by the near cache itself.
#[derive(Debug, Clone)]
pub struct SingleInvalidation {
    pub key: Data,
    pub source: Uuid,
    pub partition: Uuid,
    pub sequence: i64,
}

/// Batched invalidations, one entry per mutated key. An empty `keys` list
/// means "invalidate everything" by convention of the backing protocol.
#[derive(Debug, Clone)]
pub struct BatchInvalidation {
    pub keys: Vec<Data>,
    pub sources: Vec<Uuid>,
    pub partitions: Vec<Uuid>,
    pub sequences: Vec<i64>,
}

#[derive(Debug, Clone)]
pub enum InvalidationEvent {
    Single(SingleInvalidation),
    Batch(BatchInvalidation),
}

/// Subscription add/remove request body, keyed by the generated
/// subscription id on the client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReq {
    pub cache_name: String,
    pub subscription_id: Uuid,
    pub local_only: bool,
}

pub fn encode_request(op: Opcode, payload: &[u8]) -> BytesMut {
    // frame: [u32 len][u8 opcode][payload]
    let len = 1 + payload.len();
    let mut out = BytesMut::with_capacity(4 + len);
    out.put_u32_le(len as u32);
    out.put_u8(op as u8);
    out.extend_from_slice(payload);
    out
}

pub fn encode_subscription_payload(req: &SubscriptionReq) -> BytesMut {
    let mut out = BytesMut::with_capacity(2 + req.cache_name.len() + 16 + 1);
    out.put_u16_le(req.cache_name.len() as u16);
    out.extend_from_slice(req.cache_name.as_bytes());
    out.extend_from_slice(req.subscription_id.as_bytes());
    out.put_u8(req.local_only as u8);
    out
}

pub fn decode_subscription_payload(mut p: &[u8]) -> Result<SubscriptionReq, ProtoError> {
    if p.remaining() < 2 {
        return Err(ProtoError::BadPayload);
    }
    let nlen = p.get_u16_le() as usize;
    if p.remaining() < nlen + 16 + 1 {
        return Err(ProtoError::BadPayload);
    }
    let cache_name = std::str::from_utf8(&p[..nlen])
        .map_err(|_| ProtoError::InvalidUtf8)?
        .to_string();
    p.advance(nlen);
    let subscription_id = get_uuid(&mut p)?;
    let local_only = p.get_u8() != 0;
    Ok(SubscriptionReq {
        cache_name,
        subscription_id,
        local_only,
    })
}

pub fn encode_invalidation_payload(ev: &InvalidationEvent) -> BytesMut {
    match ev {
        InvalidationEvent::Single(ev) => {
            let mut out = BytesMut::with_capacity(1 + 2 + ev.key.len() + 16 + 16 + 8);
            out.put_u8(EventType::SingleInvalidation as u8);
            put_data(&mut out, &ev.key);
            out.extend_from_slice(ev.source.as_bytes());
            out.extend_from_slice(ev.partition.as_bytes());
            out.put_i64_le(ev.sequence);
            out
        }
        InvalidationEvent::Batch(ev) => {
            let mut out = BytesMut::new();
            out.put_u8(EventType::BatchInvalidation as u8);
            out.put_u32_le(ev.keys.len() as u32);
            for key in &ev.keys {
                put_data(&mut out, key);
            }
            for source in &ev.sources {
                out.extend_from_slice(source.as_bytes());
            }
            for partition in &ev.partitions {
                out.extend_from_slice(partition.as_bytes());
            }
            for seq in &ev.sequences {
                out.put_i64_le(*seq);
            }
            out
        }
    }
}

pub fn decode_invalidation_payload(mut p: &[u8]) -> Result<InvalidationEvent, ProtoError> {
    if p.remaining() < 1 {
        return Err(ProtoError::BadPayload);
    }
    match EventType::try_from(p.get_u8())? {
        EventType::SingleInvalidation => {
            let key = get_data(&mut p)?;
            if p.remaining() < 16 + 16 + 8 {
                return Err(ProtoError::BadPayload);
            }
            let source = get_uuid(&mut p)?;
            let partition = get_uuid(&mut p)?;
            let sequence = p.get_i64_le();
            Ok(InvalidationEvent::Single(SingleInvalidation {
                key,
                source,
                partition,
                sequence,
            }))
        }
        EventType::BatchInvalidation => {
            if p.remaining() < 4 {
                return Err(ProtoError::BadPayload);
            }
            let count = p.get_u32_le() as usize;
            // Each entry needs at least its 2-byte key length prefix plus
            // the 40-byte uuid/sequence trailer; reject counts the payload
            // cannot possibly hold before allocating anything.
            if count > p.remaining() / 2 {
                return Err(ProtoError::BadPayload);
            }
            let mut keys = Vec::with_capacity(count);
            for _ in 0..count {
                keys.push(get_data(&mut p)?);
            }
            if p.remaining() < count * (16 + 16 + 8) {
                return Err(ProtoError::BadPayload);
            }
            let mut sources = Vec::with_capacity(count);
            for _ in 0..count {
                sources.push(get_uuid(&mut p)?);
            }
            let mut partitions = Vec::with_capacity(count);
            for _ in 0..count {
                partitions.push(get_uuid(&mut p)?);
            }
            let mut sequences = Vec::with_capacity(count);
            for _ in 0..count {
                sequences.push(p.get_i64_le());
            }
            Ok(InvalidationEvent::Batch(BatchInvalidation {
                keys,
                sources,
                partitions,
                sequences,
            }))
        }
    }
}

fn put_data(out: &mut BytesMut, data: &Data) {
    out.put_u16_le(data.len() as u16);
    out.extend_from_slice(data.as_bytes());
}

fn get_data(p: &mut &[u8]) -> Result<Data, ProtoError> {
    if p.remaining() < 2 {
        return Err(ProtoError::BadPayload);
    }
    let klen = p.get_u16_le() as usize;
    if p.remaining() < klen {
        return Err(ProtoError::BadPayload);
    }
    let data = Data::new(Bytes::copy_from_slice(&p[..klen]));
    p.advance(klen);
    Ok(data)
}

fn get_uuid(p: &mut &[u8]) -> Result<Uuid, ProtoError> {
    if p.remaining() < 16 {
        return Err(ProtoError::BadPayload);
    }
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&p[..16]);
    p.advance(16);
    Ok(Uuid::from_bytes(raw))
}
