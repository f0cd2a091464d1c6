use gridmap_proto::ProtoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NearCacheError {
    /// A record is marked read-permitted but carries no payload. The store
    /// was populated outside the reservation protocol.
    #[error("format mismatch: read-permitted record has no payload")]
    FormatMismatch,
    #[error("invalid near cache config: {0}")]
    InvalidConfig(String),
    #[error("key codec: {0}")]
    KeyCodec(String),
    #[error(transparent)]
    Proto(#[from] ProtoError),
}
