use crate::error::NearCacheError;

/// Default record lifetime assigned at reservation time.
pub const DEFAULT_TTL_MS: u64 = 60 * 60 * 1000;

/// Per-cache settings. TTL and key handling are validated upstream by the
/// client configuration layer; `validate` only re-checks what the record
/// store itself depends on.
#[derive(Clone, Debug)]
pub struct NearCacheConfig {
    /// Name of the backing remote map.
    pub name: String,
    /// Lifetime assigned to every record when its slot is reserved.
    pub default_ttl_ms: u64,
    /// Key store slots by canonical serialized form so that keys equal
    /// under the server's equality land in the same slot.
    pub serialize_keys: bool,
    /// Subscribe only to invalidations originating on the owning member.
    pub local_only: bool,
}

impl NearCacheConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_ttl_ms: DEFAULT_TTL_MS,
            serialize_keys: true,
            local_only: false,
        }
    }

    pub fn validate(&self) -> Result<(), NearCacheError> {
        if self.name.is_empty() {
            return Err(NearCacheError::InvalidConfig(
                "cache name must not be empty".to_string(),
            ));
        }
        if self.default_ttl_ms == 0 {
            return Err(NearCacheError::InvalidConfig(
                "default TTL must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
