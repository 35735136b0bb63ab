//! Bounded byte accumulator for the draining task.
//!
//! Bytes are appended at the tail and consumed from the front. Consuming is
//! an `advance` on a [`BytesMut`], so dropping a frame never copies the rest
//! of the buffer.
//!
//! The buffer is capped. When an append would overflow the cap, the oldest
//! bytes go first: the stream resynchronizes on the next sentinel anyway, and
//! stale bytes are worth less than fresh ones.

use bytes::{Buf, BytesMut};
use tracing::warn;

/// Default capacity cap in bytes.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Append-only byte buffer with front consumption and a size cap.
#[derive(Debug)]
pub struct ByteStreamBuffer {
    buf: BytesMut,
    limit: usize,
}

impl Default for ByteStreamBuffer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_CAPACITY)
    }
}

impl ByteStreamBuffer {
    /// Create a buffer capped at `limit` bytes (at least 1).
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.max(1);
        Self { buf: BytesMut::with_capacity(limit), limit }
    }

    /// Append bytes at the tail.
    ///
    /// Returns how many of the oldest bytes were discarded to respect the cap.
    pub fn append(&mut self, data: &[u8]) -> usize {
        if data.len() >= self.limit {
            let dropped = self.buf.len() + (data.len() - self.limit);
            self.buf.clear();
            self.buf.extend_from_slice(&data[data.len() - self.limit..]);
            if dropped > 0 {
                warn!("Buffer overflow: discarded {} oldest bytes", dropped);
            }
            return dropped;
        }

        let overflow = (self.buf.len() + data.len()).saturating_sub(self.limit);
        if overflow > 0 {
            warn!("Buffer overflow: discarded {} oldest bytes", overflow);
            self.buf.advance(overflow);
        }
        self.buf.extend_from_slice(data);
        overflow
    }

    /// Remove the first `n` bytes. `n` is clamped to the current length.
    pub fn drop_front(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bounds-checked read access without mutation.
    pub fn slice(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        self.buf.get(offset..end)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn append_and_drop_front() {
        let mut buf = ByteStreamBuffer::with_limit(16);
        assert_eq!(buf.append(b"hello world"), 0);
        buf.drop_front(6);
        assert_eq!(buf.as_slice(), b"world");
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn drop_front_clamps() {
        let mut buf = ByteStreamBuffer::with_limit(16);
        buf.append(b"abc");
        buf.drop_front(10);
        assert!(buf.is_empty());
    }

    #[test]
    fn slice_is_bounds_checked() {
        let mut buf = ByteStreamBuffer::with_limit(16);
        buf.append(b"abcdef");
        assert_eq!(buf.slice(2, 3), Some(&b"cde"[..]));
        assert_eq!(buf.slice(4, 3), None);
        assert_eq!(buf.slice(usize::MAX, 2), None);
        assert_eq!(buf.slice(6, 0), Some(&b""[..]));
    }

    #[test]
    fn overflow_discards_oldest_first() {
        let mut buf = ByteStreamBuffer::with_limit(8);
        buf.append(b"012345");
        let dropped = buf.append(b"6789");
        assert_eq!(dropped, 2);
        assert_eq!(buf.as_slice(), b"23456789");
    }

    #[test]
    fn oversized_append_keeps_tail() {
        let mut buf = ByteStreamBuffer::with_limit(4);
        buf.append(b"ab");
        let dropped = buf.append(b"0123456789");
        assert_eq!(dropped, 8);
        assert_eq!(buf.as_slice(), b"6789");
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_limit_and_keeps_newest(
            limit in 1usize..64,
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..80), 0..20)
        ) {
            let mut buf = ByteStreamBuffer::with_limit(limit);
            let mut all = Vec::new();
            let mut dropped_total = 0usize;

            for chunk in &chunks {
                dropped_total += buf.append(chunk);
                all.extend_from_slice(chunk);
                prop_assert!(buf.len() <= limit);
            }

            let keep = all.len().min(limit);
            prop_assert_eq!(buf.as_slice(), &all[all.len() - keep..]);
            prop_assert_eq!(dropped_total, all.len() - keep);
        }
    }
}
