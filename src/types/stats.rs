//! Stream statistics

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Monotonic per-connection counters.
///
/// Reset whenever a new connection is entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Raw bytes pulled from the transport
    pub bytes_received: u64,
    /// Newline-terminated text lines seen
    pub text_lines: u64,
    /// Binary candidates that passed frame validation
    pub binary_frames: u64,
    /// Frames that produced a parameter sample
    pub successful_responses: u64,
    /// Candidates rejected for bad length or tag
    pub decode_errors: u64,
    /// Valid frames whose tag is not in the registry
    pub unknown_parameters: u64,
    /// Valid frames for known tags carrying a non-response opcode
    pub unexpected_operations: u64,
    /// Resynchronization events (1-byte advances and noise discards)
    pub resync_drops: u64,
    /// Bytes discarded by the buffer capacity cap
    pub overflow_bytes_dropped: u64,
    /// Read requests written to the transport
    pub requests_sent: u64,
}

/// Point-in-time copy of the counters plus the derived frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub stats: StreamStats,
    /// Binary frames recognized since the previous snapshot
    pub frames_per_second: u64,
    pub taken_at: SystemTime,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self { stats: StreamStats::default(), frames_per_second: 0, taken_at: SystemTime::UNIX_EPOCH }
    }
}
