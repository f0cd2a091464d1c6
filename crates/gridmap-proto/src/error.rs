use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("bad payload")]
    BadPayload,
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("unknown event type {0}")]
    UnknownEventType(u8),
    #[error("invalid utf-8 in payload")]
    InvalidUtf8,
}
