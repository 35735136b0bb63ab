//! Frame scanner for mixed text/binary streams

use bytes::Bytes;
use tracing::trace;

use super::wire::{FRAME_SIZE, SENTINEL, WIRE_FRAME_SIZE};
use crate::types::TextLine;

/// What the leading bytes of a buffer turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A complete text line, newline included.
    Text { line: TextLine, consumed: usize },

    /// A sentinel followed by a full payload.
    ///
    /// The scanner does not know whether the payload is valid. The caller
    /// advances `consumed` bytes if it decodes, or exactly one byte if it
    /// does not (the real frame may start inside this window).
    Binary { payload: [u8; FRAME_SIZE], consumed: usize },

    /// Unframed bytes in front of the next sentinel.
    Noise { consumed: usize },

    /// Nothing can be decided until more bytes arrive.
    NeedMoreData,
}

/// Decides what to do with the front of the buffer without blocking.
///
/// Scanning is a pure function of the buffer contents; consuming bytes is
/// left to the caller so a failed binary candidate can be retried one byte
/// further along.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameScanner;

impl FrameScanner {
    pub fn new() -> Self {
        Self
    }

    /// Classify the leading bytes of `buf`.
    pub fn scan(&self, buf: &[u8]) -> ScanOutcome {
        if buf.starts_with(&SENTINEL) {
            if buf.len() < WIRE_FRAME_SIZE {
                trace!("Sentinel with {} of {} bytes, waiting", buf.len(), WIRE_FRAME_SIZE);
                return ScanOutcome::NeedMoreData;
            }

            let mut payload = [0u8; FRAME_SIZE];
            payload.copy_from_slice(&buf[SENTINEL.len()..WIRE_FRAME_SIZE]);
            return ScanOutcome::Binary { payload, consumed: WIRE_FRAME_SIZE };
        }

        let sentinel_at = find_sentinel(buf);
        let newline_at = buf.iter().position(|&b| b == b'\n');

        match (sentinel_at, newline_at) {
            (Some(s), Some(n)) if n < s => text_outcome(buf, n),
            (Some(s), _) => ScanOutcome::Noise { consumed: s },
            (None, Some(n)) => text_outcome(buf, n),
            (None, None) => ScanOutcome::NeedMoreData,
        }
    }
}

fn text_outcome(buf: &[u8], newline_at: usize) -> ScanOutcome {
    let consumed = newline_at + 1;
    ScanOutcome::Text { line: TextLine::new(Bytes::copy_from_slice(&buf[..consumed])), consumed }
}

fn find_sentinel(buf: &[u8]) -> Option<usize> {
    buf.windows(SENTINEL.len()).position(|w| w == SENTINEL)
}
