use std::fmt;

/// Size of the big-endian frame length field.
pub const LEN_FIELD_SIZE: usize = 4;
/// Size of the ASCII operation tag field.
pub const OP_FIELD_SIZE: usize = 2;
/// Bytes of every frame that are not payload (length field + tag).
pub const FRAME_OVERHEAD: usize = LEN_FIELD_SIZE + OP_FIELD_SIZE;

/// The operations spoken on the wire.
///
/// Each variant maps to a fixed 2-character ASCII tag. Direction and payload
/// shape per operation:
///
/// | Op | Tag | C→S payload | S→C payload |
/// |----|-----|-------------|-------------|
/// | `Handshake` | `HS` | 4-byte capacity | target digest string |
/// | `Allocate`  | `AL` | empty (request) | `start,end` as two 4-byte ints |
/// | `NotNeeded` | `ND` | — | empty |
/// | `Heartbeat` | `HB` | empty | — |
/// | `Found`     | `FN` | 4-byte candidate | empty (stop broadcast) |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Handshake,
    NotNeeded,
    Allocate,
    Heartbeat,
    Found,
}

impl OpCode {
    /// The 2-byte ASCII tag written on the wire for this operation.
    pub fn tag(self) -> [u8; OP_FIELD_SIZE] {
        match self {
            OpCode::Handshake => *b"HS",
            OpCode::NotNeeded => *b"ND",
            OpCode::Allocate => *b"AL",
            OpCode::Heartbeat => *b"HB",
            OpCode::Found => *b"FN",
        }
    }

    /// Parses a wire tag. `None` for tags outside the protocol.
    pub fn from_tag(tag: [u8; OP_FIELD_SIZE]) -> Option<Self> {
        match &tag {
            b"HS" => Some(OpCode::Handshake),
            b"ND" => Some(OpCode::NotNeeded),
            b"AL" => Some(OpCode::Allocate),
            b"HB" => Some(OpCode::Heartbeat),
            b"FN" => Some(OpCode::Found),
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        write!(f, "{}{}", tag[0] as char, tag[1] as char)
    }
}

/// One decoded message off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub op: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(op: OpCode, payload: Vec<u8>) -> Self {
        Self { op, payload }
    }
}
