use crate::ProtoError;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Opcode {
    AddInvalidationListener = 0x20,
    RemoveInvalidationListener = 0x21,

    PushInvalidation = 0x80,
}

impl TryFrom<u8> for Opcode {
    type Error = ProtoError;

    fn try_from(v: u8) -> Result<Self, ProtoError> {
        match v {
            0x20 => Ok(Opcode::AddInvalidationListener),
            0x21 => Ok(Opcode::RemoveInvalidationListener),
            0x80 => Ok(Opcode::PushInvalidation),
            other => Err(ProtoError::UnknownOpcode(other)),
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventType {
    SingleInvalidation = 1,
    BatchInvalidation = 2,
}

impl TryFrom<u8> for EventType {
    type Error = ProtoError;

    fn try_from(v: u8) -> Result<Self, ProtoError> {
        match v {
            1 => Ok(EventType::SingleInvalidation),
            2 => Ok(EventType::BatchInvalidation),
            other => Err(ProtoError::UnknownEventType(other)),
        }
    }
}
