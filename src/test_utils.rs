//! Test utilities: wire-level frame builders and a recording sink
//!
//! Shared by unit tests, integration tests and the benchmarks so every
//! fixture is built the same way the ECU firmware builds its frames.

#![cfg(any(test, feature = "benchmark"))]

use crate::codec::encode_response;
use crate::framing::encode_frame;
use crate::registry::{CURRENT_GEAR, FLUID_TEMPERATURE, VEHICLE_SPEED};
use crate::sink::StreamSink;
use crate::types::{BinaryMessage, ByteOrder, ParameterSample, StatsSnapshot, TextLine};

/// Source channel the simulated ECU stamps on its responses.
pub const ECU_CHANNEL: u8 = 1;

/// A complete sentinel-framed little-endian read response.
pub fn response_frame(tag: u32, value: f32, request_id: u8) -> Vec<u8> {
    response_frame_ordered(tag, value, request_id, ByteOrder::Little)
}

/// A complete sentinel-framed read response with an explicit float byte order.
pub fn response_frame_ordered(tag: u32, value: f32, request_id: u8, order: ByteOrder) -> Vec<u8> {
    let data = encode_response(value, ECU_CHANNEL, request_id, order);
    encode_frame(&BinaryMessage::new(tag, 0, data)).to_vec()
}

/// A complete frame with arbitrary header fields (for malformed-frame tests).
pub fn raw_frame(tag: u32, length: u8, data: [u8; 8]) -> Vec<u8> {
    let message = BinaryMessage { tag, sequence: 0, flags: 0, length, payload: data };
    encode_frame(&message).to_vec()
}

/// A realistic capture: boot text, then `cycles` rounds of debug chatter and
/// one response for each reference parameter.
pub fn mixed_stream(cycles: usize) -> Vec<u8> {
    let mut out = b"Backslider ECU v2 booting\nParameterRegistry: 3 parameters registered\n".to_vec();
    for i in 0..cycles {
        let id = (i % 255) as u8 + 1;
        out.extend_from_slice(b"SerialBridge: Sending binary response\n");
        out.extend(response_frame(FLUID_TEMPERATURE, 180.0 + (i % 10) as f32, id));
        out.extend(response_frame(CURRENT_GEAR, (i % 6) as f32, id));
        out.extend_from_slice(b"MessageBus: tick\n");
        out.extend(response_frame(VEHICLE_SPEED, (i % 120) as f32, id));
    }
    out
}

/// Sink that keeps everything it is handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub texts: Vec<TextLine>,
    pub samples: Vec<ParameterSample>,
    pub snapshots: Vec<StatsSnapshot>,
}

impl StreamSink for RecordingSink {
    fn on_text_line(&mut self, line: &TextLine) {
        self.texts.push(line.clone());
    }

    fn on_parameter_sample(&mut self, sample: &ParameterSample) {
        self.samples.push(sample.clone());
    }

    fn on_stats_snapshot(&mut self, snapshot: &StatsSnapshot) {
        self.snapshots.push(*snapshot);
    }
}
