//! Stream processor: buffer, scanner and codecs behind one state machine.
//!
//! The processor is synchronous and owns all per-connection parsing state.
//! The draining task feeds it whatever the transport produced and it pushes
//! results into a [`StreamSink`].
//!
//! ```text
//! Idle ──connect()──► Connected ──ingest()──► Draining ──(need more data)──► Connected
//!                         │                                                    │
//!                         └──────────────disconnect()──────────► Disconnected ◄┘
//! ```
//!
//! Bad frames never fail the stream. Any candidate that does not become a
//! sample costs one byte and is counted by failure kind; the real frame may
//! start inside it, for instance after a truncated write.

use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

use crate::DecodeError;
use crate::buffer::ByteStreamBuffer;
use crate::codec::{BinaryMessageDecoder, ParameterCodec};
use crate::framing::{FRAME_SIZE, FrameScanner, ScanOutcome};
use crate::sink::StreamSink;
use crate::types::{ConnectionState, MAX_DATA_LEN, StatsSnapshot, StreamStats};

/// How the buffer should advance after a binary candidate.
enum Advance {
    Frame,
    Resync,
}

/// Per-connection framing and decoding state machine.
#[derive(Debug)]
pub struct StreamProcessor {
    state: ConnectionState,
    buffer: ByteStreamBuffer,
    scanner: FrameScanner,
    codec: ParameterCodec,
    stats: StreamStats,
    frames_at_last_snapshot: u64,
}

impl StreamProcessor {
    /// Create an idle processor with a receive buffer capped at `buffer_capacity`.
    pub fn new(codec: ParameterCodec, buffer_capacity: usize) -> Self {
        Self {
            state: ConnectionState::Idle,
            buffer: ByteStreamBuffer::with_limit(buffer_capacity),
            scanner: FrameScanner::new(),
            codec,
            stats: StreamStats::default(),
            frames_at_last_snapshot: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Bytes waiting for more data.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Enter `Connected`, discarding any previous buffer and counters.
    pub fn connect(&mut self) {
        self.buffer.clear();
        self.stats = StreamStats::default();
        self.frames_at_last_snapshot = 0;
        self.state = ConnectionState::Connected;
        debug!("Processor connected, counters reset");
    }

    /// Enter `Disconnected`. A partially filled buffer is dropped, not flushed.
    pub fn disconnect(&mut self) {
        if !self.buffer.is_empty() {
            debug!("Discarding {} buffered bytes on disconnect", self.buffer.len());
        }
        self.buffer.clear();
        self.state = ConnectionState::Disconnected;
        info!(
            bytes = self.stats.bytes_received,
            frames = self.stats.binary_frames,
            samples = self.stats.successful_responses,
            "Processor disconnected"
        );
    }

    /// Record the request counter maintained by the request task.
    pub fn set_requests_sent(&mut self, requests: u64) {
        self.stats.requests_sent = requests;
    }

    /// Append freshly received bytes and drain every complete frame.
    ///
    /// Large inputs are fed in pieces that fit the buffer, draining between
    /// pieces, so bytes are only lost when undecidable data fills the whole
    /// buffer. Ignored unless the processor is `Connected`.
    pub fn ingest<S: StreamSink>(&mut self, bytes: &[u8], sink: &mut S) {
        if self.state != ConnectionState::Connected {
            debug!("Ignoring {} bytes while {:?}", bytes.len(), self.state);
            return;
        }

        self.stats.bytes_received += bytes.len() as u64;

        let mut rest = bytes;
        while !rest.is_empty() {
            let room = match self.buffer.limit() - self.buffer.len() {
                // Buffer full of undecidable bytes: overflow is unavoidable
                0 => self.buffer.limit(),
                room => room,
            };
            let (piece, tail) = rest.split_at(room.min(rest.len()));
            self.stats.overflow_bytes_dropped += self.buffer.append(piece) as u64;
            self.drain(sink);
            rest = tail;
        }
    }

    /// Run the scanner until it needs more data.
    pub fn drain<S: StreamSink>(&mut self, sink: &mut S) {
        if self.state != ConnectionState::Connected {
            return;
        }
        self.state = ConnectionState::Draining;

        loop {
            match self.scanner.scan(self.buffer.as_slice()) {
                ScanOutcome::NeedMoreData => break,
                ScanOutcome::Text { line, consumed } => {
                    self.stats.text_lines += 1;
                    match line.marker() {
                        Some(marker) => debug!(marker, "Device: {}", line.text()),
                        None => trace!("Device: {}", line.text()),
                    }
                    sink.on_text_line(&line);
                    self.buffer.drop_front(consumed);
                }
                ScanOutcome::Noise { consumed } => {
                    trace!("Discarding {} unframed bytes before sentinel", consumed);
                    self.stats.resync_drops += 1;
                    self.buffer.drop_front(consumed);
                }
                ScanOutcome::Binary { payload, consumed } => {
                    match self.handle_candidate(&payload, sink) {
                        Advance::Frame => self.buffer.drop_front(consumed),
                        Advance::Resync => {
                            self.stats.resync_drops += 1;
                            self.buffer.drop_front(1);
                        }
                    }
                }
            }
        }

        self.state = ConnectionState::Connected;
    }

    fn handle_candidate<S: StreamSink>(&mut self, payload: &[u8; FRAME_SIZE], sink: &mut S) -> Advance {
        let message = match BinaryMessageDecoder::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                trace!("Rejected binary candidate: {}", e);
                self.stats.decode_errors += 1;
                return Advance::Resync;
            }
        };
        self.stats.binary_frames += 1;

        let result = if message.length != MAX_DATA_LEN && self.codec.registry().contains(message.tag) {
            Err(DecodeError::TruncatedPayload { length: message.length })
        } else {
            self.codec.decode_response(message.tag, &message.payload)
        };

        match result {
            Ok(sample) => {
                self.stats.successful_responses += 1;
                if let Some(descriptor) = self.codec.registry().get(sample.tag) {
                    if sample.in_range {
                        debug!(
                            tag = format!("{:#010x}", sample.tag),
                            request_id = sample.request_id,
                            "{}: {:.2} {}",
                            descriptor.name,
                            sample.value,
                            descriptor.unit
                        );
                    } else {
                        warn!(
                            tag = format!("{:#010x}", sample.tag),
                            "{} value {} outside plausible range {}..={}",
                            descriptor.name,
                            sample.value,
                            descriptor.valid_range.min,
                            descriptor.valid_range.max
                        );
                    }
                }
                sink.on_parameter_sample(&sample);
                Advance::Frame
            }
            Err(DecodeError::UnknownParameter { tag }) => {
                trace!("Frame for unregistered tag {:#010x}", tag);
                self.stats.unknown_parameters += 1;
                Advance::Resync
            }
            Err(DecodeError::UnexpectedOperation { opcode }) => {
                trace!("Frame for {:#010x} with opcode {:#04x}", message.tag, opcode);
                self.stats.unexpected_operations += 1;
                Advance::Resync
            }
            Err(e) => {
                debug!("Unusable frame for {:#010x}: {}", message.tag, e);
                self.stats.decode_errors += 1;
                Advance::Resync
            }
        }
    }

    /// Take a stats snapshot; `frames_per_second` counts binary frames since
    /// the previous snapshot.
    pub fn snapshot(&mut self) -> StatsSnapshot {
        let frames = self.stats.binary_frames;
        let frames_per_second = frames.saturating_sub(self.frames_at_last_snapshot);
        self.frames_at_last_snapshot = frames;
        StatsSnapshot { stats: self.stats, frames_per_second, taken_at: SystemTime::now() }
    }

    /// Take a snapshot and hand it to `sink`.
    pub fn emit_snapshot<S: StreamSink>(&mut self, sink: &mut S) -> StatsSnapshot {
        let snapshot = self.snapshot();
        sink.on_stats_snapshot(&snapshot);
        snapshot
    }
}
