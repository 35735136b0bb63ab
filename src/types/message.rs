//! Decoded binary message types

use serde::{Deserialize, Serialize};

/// Highest tag value accepted on the wire (29-bit identifier space).
pub const MAX_TAG: u32 = 0x1FFF_FFFF;

/// Maximum number of meaningful data bytes in a message.
pub const MAX_DATA_LEN: u8 = 8;

/// One validated binary message carved out of the byte stream.
///
/// Only the first `length` bytes of `payload` carry meaning; the rest are
/// whatever the sender left in its buffer and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMessage {
    /// Parameter/message identifier
    pub tag: u32,

    /// Sender sequence number or millisecond timestamp
    pub sequence: u32,

    /// Opaque sender flags
    pub flags: u8,

    /// Number of meaningful bytes in `payload` (0..=8)
    pub length: u8,

    /// Raw data field
    pub payload: [u8; 8],
}

impl BinaryMessage {
    /// Create a message carrying a full 8-byte payload.
    pub fn new(tag: u32, sequence: u32, payload: [u8; 8]) -> Self {
        Self { tag, sequence, flags: 0, length: MAX_DATA_LEN, payload }
    }

    /// The meaningful prefix of the payload.
    pub fn data(&self) -> &[u8] {
        let len = usize::from(self.length.min(MAX_DATA_LEN));
        &self.payload[..len]
    }

    /// Serialize to the 24-byte payload layout (no sentinel).
    pub fn encode(&self) -> [u8; crate::framing::FRAME_SIZE] {
        crate::framing::encode_payload(self)
    }

    /// Whether the tag lies in the accepted identifier range.
    pub fn has_valid_tag(&self) -> bool {
        self.tag != 0 && self.tag <= MAX_TAG
    }
}
