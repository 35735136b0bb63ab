//! Core types for decoded stream data.
//!
//! - [`BinaryMessage`] is one validated 24-byte frame payload
//! - [`ParameterDescriptor`] and [`ValidRange`] describe a known parameter
//! - [`ParameterSample`] is a decoded read-response, ready for display
//! - [`StreamStats`] and [`StatsSnapshot`] carry per-connection counters
//! - [`StreamEvent`] is what observers receive from a running connection
//!
//! ## Usage Example
//!
//! ```rust
//! use canstream::types::{ByteOrder, ValidRange};
//!
//! let fluid_range = ValidRange::new(50.0, 400.0);
//! let wire = ByteOrder::Big.write_f32(180.0);
//!
//! // Little-endian reading of big-endian bytes is implausible...
//! assert!(!fluid_range.contains(ByteOrder::Little.read_f32(wire)));
//! // ...the big-endian one is not.
//! assert!(fluid_range.contains(ByteOrder::Big.read_f32(wire)));
//! ```

mod event;
mod message;
mod parameter;
mod stats;
mod update_rate;

pub use event::{ConnectionState, StreamEvent, TextLine};
pub use message::{BinaryMessage, MAX_DATA_LEN, MAX_TAG};
pub use parameter::{ByteOrder, ParameterDescriptor, ParameterSample, ValidRange};
pub use stats::{StatsSnapshot, StreamStats};
pub use update_rate::UpdateRate;

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_byte_order_roundtrip_preserves_value(value in any::<f32>()) {
            for order in [ByteOrder::Little, ByteOrder::Big] {
                let parsed = order.read_f32(order.write_f32(value));
                if value.is_nan() {
                    prop_assert!(parsed.is_nan());
                } else {
                    prop_assert_eq!(parsed.to_bits(), value.to_bits());
                }
            }
        }

        #[test]
        fn prop_data_never_exceeds_length(length in 0u8..=8, payload in any::<[u8; 8]>()) {
            let msg = BinaryMessage { tag: 1, sequence: 0, flags: 0, length, payload };
            prop_assert_eq!(msg.data().len(), usize::from(length));
            prop_assert_eq!(msg.data(), &payload[..usize::from(length)]);
        }

        #[test]
        fn prop_range_contains_its_bounds(a in -1000f32..1000f32, b in -1000f32..1000f32) {
            let range = ValidRange::new(a.min(b), a.max(b));
            prop_assert!(range.contains(range.min));
            prop_assert!(range.contains(range.max));
        }
    }

    #[test]
    fn nan_is_never_in_range() {
        assert!(!ValidRange::new(f32::MIN, f32::MAX).contains(f32::NAN));
    }

    #[test]
    fn tag_range_checks() {
        let mut msg = BinaryMessage::new(0x1050_0001, 0, [0; 8]);
        assert!(msg.has_valid_tag());
        msg.tag = 0;
        assert!(!msg.has_valid_tag());
        msg.tag = MAX_TAG + 1;
        assert!(!msg.has_valid_tag());
        msg.tag = MAX_TAG;
        assert!(msg.has_valid_tag());
    }

    #[test]
    fn stats_default_is_zeroed() {
        let stats = StreamStats::default();
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.binary_frames, 0);
        assert_eq!(StatsSnapshot::default().frames_per_second, 0);
    }
}
