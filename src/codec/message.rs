//! Binary message decoder
//!
//! Validates a 24-byte payload (the bytes after the sentinel) and turns it
//! into a [`BinaryMessage`]. All multi-byte integers are little-endian.

use crate::DecodeError;
use crate::framing::FRAME_SIZE;
use crate::framing::wire::{
    DATA_END, DATA_OFFSET, FLAGS_OFFSET, LENGTH_OFFSET, SEQUENCE_OFFSET, TAG_OFFSET,
};
use crate::types::{BinaryMessage, MAX_DATA_LEN};

/// Stateless decoder for fixed-size binary payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryMessageDecoder;

impl BinaryMessageDecoder {
    /// Decode and validate one payload.
    ///
    /// The length field is checked before the tag, so an oversized length is
    /// reported as [`DecodeError::InvalidLength`] whatever the tag holds.
    pub fn decode(payload: &[u8; FRAME_SIZE]) -> Result<BinaryMessage, DecodeError> {
        let length = payload[LENGTH_OFFSET];
        if length > MAX_DATA_LEN {
            return Err(DecodeError::InvalidLength { length });
        }

        let mut data = [0u8; 8];
        data.copy_from_slice(&payload[DATA_OFFSET..DATA_END]);

        let message = BinaryMessage {
            tag: read_u32_le(payload, TAG_OFFSET),
            sequence: read_u32_le(payload, SEQUENCE_OFFSET),
            flags: payload[FLAGS_OFFSET],
            length,
            payload: data,
        };
        if !message.has_valid_tag() {
            return Err(DecodeError::InvalidTag { tag: message.tag });
        }
        Ok(message)
    }
}

fn read_u32_le(payload: &[u8; FRAME_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}
