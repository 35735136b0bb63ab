//! Parameter read-request/response codec
//!
//! The 8-byte data field of a parameter message is laid out as:
//!
//! ```text
//! offset  size  field
//! 0       1     operation (0x01 = READ_REQUEST, 0x03 = READ_RESPONSE)
//! 1..5    4     value (f32, byte order resolved by range check)
//! 5       1     source channel
//! 6       1     request id (1..=255)
//! 7       1     reserved
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use crate::DecodeError;
use crate::framing::{WIRE_FRAME_SIZE, encode_frame};
use crate::registry::ParameterRegistry;
use crate::types::{BinaryMessage, ByteOrder, ParameterSample};

/// Operation code of a read request.
pub const READ_REQUEST: u8 = 0x01;
/// Operation code of a read response.
pub const READ_RESPONSE: u8 = 0x03;

/// Default channel id stamped on outbound requests.
pub const DEFAULT_SENDER_CHANNEL: u8 = 1;

/// Decodes read-responses and encodes read-requests for registered tags.
#[derive(Debug, Clone)]
pub struct ParameterCodec {
    registry: Arc<ParameterRegistry>,
    sender_channel: u8,
}

impl ParameterCodec {
    pub fn new(registry: Arc<ParameterRegistry>) -> Self {
        Self { registry, sender_channel: DEFAULT_SENDER_CHANNEL }
    }

    pub fn with_sender_channel(mut self, channel: u8) -> Self {
        self.sender_channel = channel;
        self
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Interpret a response payload for `tag`.
    ///
    /// The float is read both ways round. Little-endian wins if it lands in
    /// the parameter's valid range, then big-endian; if neither does, the
    /// little-endian value is kept and the sample is marked out of range.
    pub fn decode_response(&self, tag: u32, data: &[u8; 8]) -> Result<ParameterSample, DecodeError> {
        let descriptor = self.registry.get(tag).ok_or(DecodeError::UnknownParameter { tag })?;

        let opcode = data[0];
        if opcode != READ_RESPONSE {
            return Err(DecodeError::UnexpectedOperation { opcode });
        }

        let raw = [data[1], data[2], data[3], data[4]];
        let range = descriptor.valid_range;
        let little = ByteOrder::Little.read_f32(raw);
        let big = ByteOrder::Big.read_f32(raw);

        let (value, byte_order, in_range) = if range.contains(little) {
            (little, ByteOrder::Little, true)
        } else if range.contains(big) {
            (big, ByteOrder::Big, true)
        } else {
            (little, ByteOrder::Little, false)
        };

        Ok(ParameterSample {
            tag,
            value,
            source_channel: data[5],
            request_id: data[6],
            observed_at: SystemTime::now(),
            byte_order,
            in_range,
        })
    }

    /// Build the data field of a read request.
    pub fn encode_request(&self, request_id: u8) -> [u8; 8] {
        let value = 0.0f32.to_le_bytes();
        [READ_REQUEST, value[0], value[1], value[2], value[3], self.sender_channel, request_id, 0]
    }

    /// Build a complete sentinel-framed read request for `tag`.
    pub fn request_frame(&self, tag: u32, request_id: u8, sequence: u32) -> [u8; WIRE_FRAME_SIZE] {
        encode_frame(&BinaryMessage::new(tag, sequence, self.encode_request(request_id)))
    }
}

/// Build the data field of a read response, as the ECU would send it.
pub fn encode_response(value: f32, source_channel: u8, request_id: u8, order: ByteOrder) -> [u8; 8] {
    let v = order.write_f32(value);
    [READ_RESPONSE, v[0], v[1], v[2], v[3], source_channel, request_id, 0]
}

/// Request id generator: 1, 2, ..., 255, 1, ... and never 0.
#[derive(Debug, Clone)]
pub struct RequestIdSequence {
    next: u8,
}

impl Default for RequestIdSequence {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl RequestIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current id and advance.
    pub fn next_id(&mut self) -> u8 {
        let id = self.next;
        self.next = if id == u8::MAX { 1 } else { id + 1 };
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CURRENT_GEAR, FLUID_TEMPERATURE};
    use proptest::prelude::*;

    fn codec() -> ParameterCodec {
        ParameterCodec::new(Arc::new(ParameterRegistry::default()))
    }

    #[test]
    fn decodes_little_endian_response() {
        let data = encode_response(98.6, 1, 42, ByteOrder::Little);
        let sample = codec().decode_response(FLUID_TEMPERATURE, &data).expect("valid response");

        assert!((sample.value - 98.6).abs() < 1e-4);
        assert_eq!(sample.source_channel, 1);
        assert_eq!(sample.request_id, 42);
        assert_eq!(sample.byte_order, ByteOrder::Little);
        assert!(sample.in_range);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let data = encode_response(1.0, 1, 1, ByteOrder::Little);
        assert_eq!(
            codec().decode_response(0x0ABC_DEF0, &data),
            Err(DecodeError::UnknownParameter { tag: 0x0ABC_DEF0 })
        );
    }

    #[test]
    fn echoed_request_is_unexpected_operation() {
        let codec = codec();
        let request = codec.encode_request(5);
        assert_eq!(
            codec.decode_response(CURRENT_GEAR, &request),
            Err(DecodeError::UnexpectedOperation { opcode: READ_REQUEST })
        );
    }

    #[test]
    fn request_then_response_keeps_request_id() {
        let codec = codec();
        let request = codec.encode_request(200);
        assert_eq!(request[0], READ_REQUEST);
        assert_eq!(&request[1..5], &0.0f32.to_le_bytes());
        assert_eq!(request[5], DEFAULT_SENDER_CHANNEL);
        assert_eq!(request[7], 0);

        let response = encode_response(3.0, 2, request[6], ByteOrder::Little);
        let sample = codec.decode_response(CURRENT_GEAR, &response).expect("valid");
        assert_eq!(sample.request_id, 200);
    }

    #[test]
    fn big_endian_value_is_selected_when_only_it_is_plausible() {
        let data = encode_response(98.6, 1, 7, ByteOrder::Big);
        let sample = codec().decode_response(FLUID_TEMPERATURE, &data).expect("valid");
        assert_eq!(sample.value, 98.6);
        assert_eq!(sample.byte_order, ByteOrder::Big);
        assert!(sample.in_range);
    }

    #[test]
    fn implausible_value_defaults_to_little_endian() {
        let data = encode_response(5000.0, 1, 7, ByteOrder::Little);
        let sample = codec().decode_response(FLUID_TEMPERATURE, &data).expect("valid");
        assert_eq!(sample.value, 5000.0);
        assert_eq!(sample.byte_order, ByteOrder::Little);
        assert!(!sample.in_range);
    }

    #[test]
    fn sender_channel_is_configurable() {
        let request = codec().with_sender_channel(9).encode_request(1);
        assert_eq!(request[5], 9);
    }

    #[test]
    fn request_frame_is_sentinel_prefixed() {
        let frame = codec().request_frame(FLUID_TEMPERATURE, 3, 0);
        assert_eq!(&frame[..2], &[0xFF, 0xFF]);
        assert_eq!(&frame[2..6], &FLUID_TEMPERATURE.to_le_bytes());
        assert_eq!(frame[13], 8);
        assert_eq!(frame[14], READ_REQUEST);
        assert_eq!(frame[20], 3);
    }

    #[test]
    fn request_ids_wrap_and_skip_zero() {
        let mut ids = RequestIdSequence::new();
        assert_eq!(ids.next_id(), 1);
        for _ in 2..=255 {
            ids.next_id();
        }
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
    }

    proptest! {
        #[test]
        fn prop_big_endian_in_range_values_are_recovered(value in 50.0f32..400.0f32) {
            // Skip values whose little-endian reading happens to be plausible too.
            let wire = ByteOrder::Big.write_f32(value);
            prop_assume!(!(50.0..=400.0).contains(&f32::from_le_bytes(wire)));

            let data = encode_response(value, 1, 1, ByteOrder::Big);
            let sample = codec().decode_response(FLUID_TEMPERATURE, &data).unwrap();
            prop_assert_eq!(sample.value, value);
            prop_assert_eq!(sample.byte_order, ByteOrder::Big);
        }

        #[test]
        fn prop_little_endian_in_range_values_win(value in 50.0f32..400.0f32) {
            let data = encode_response(value, 1, 1, ByteOrder::Little);
            let sample = codec().decode_response(FLUID_TEMPERATURE, &data).unwrap();
            prop_assert_eq!(sample.value, value);
            prop_assert_eq!(sample.byte_order, ByteOrder::Little);
            prop_assert!(sample.in_range);
        }

        #[test]
        fn prop_request_ids_are_never_zero(steps in 0usize..2000) {
            let mut ids = RequestIdSequence::new();
            for _ in 0..steps {
                prop_assert_ne!(ids.next_id(), 0);
            }
        }
    }
}
