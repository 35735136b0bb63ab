//! On-wire layout of binary frames
//!
//! ```text
//! offset  size  field
//! 0       2     sentinel = 0xFF 0xFF   (not part of the payload)
//! 2..6    4     tag (u32 LE)
//! 6..10   4     sequence/timestamp (u32 LE)
//! 10      1     flags
//! 11      1     length (0..=8)
//! 12..20  8     data (first `length` bytes meaningful)
//! 20..24  4     reserved
//! ```
//!
//! Offsets below are relative to the payload, i.e. after the sentinel.

use crate::types::BinaryMessage;

/// Marker preceding every binary frame.
pub const SENTINEL: [u8; 2] = [0xFF, 0xFF];

/// Size of the fixed payload following the sentinel.
pub const FRAME_SIZE: usize = 24;

/// Total bytes a binary frame occupies on the wire.
pub const WIRE_FRAME_SIZE: usize = SENTINEL.len() + FRAME_SIZE;

pub(crate) const TAG_OFFSET: usize = 0;
pub(crate) const SEQUENCE_OFFSET: usize = 4;
pub(crate) const FLAGS_OFFSET: usize = 10;
pub(crate) const LENGTH_OFFSET: usize = 11;
pub(crate) const DATA_OFFSET: usize = 12;
pub(crate) const DATA_END: usize = 20;

/// Serialize a message into its 24-byte payload. Reserved bytes are zero.
pub fn encode_payload(message: &BinaryMessage) -> [u8; FRAME_SIZE] {
    let mut out = [0u8; FRAME_SIZE];
    out[TAG_OFFSET..TAG_OFFSET + 4].copy_from_slice(&message.tag.to_le_bytes());
    out[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4].copy_from_slice(&message.sequence.to_le_bytes());
    out[FLAGS_OFFSET] = message.flags;
    out[LENGTH_OFFSET] = message.length;
    out[DATA_OFFSET..DATA_END].copy_from_slice(&message.payload);
    out
}

/// Serialize a message into a complete sentinel-prefixed wire frame.
pub fn encode_frame(message: &BinaryMessage) -> [u8; WIRE_FRAME_SIZE] {
    let mut out = [0u8; WIRE_FRAME_SIZE];
    out[..SENTINEL.len()].copy_from_slice(&SENTINEL);
    out[SENTINEL.len()..].copy_from_slice(&encode_payload(message));
    out
}
