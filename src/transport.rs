//! Transport trait for byte sources

use bytes::Bytes;

use crate::Result;

/// A duplex byte link to the ECU bridge
///
/// Transports hide the physical link (serial port, capture file, in-process
/// pipe). The driver polls them without blocking and writes requests back
/// through the same handle.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Return whatever bytes are available right now
    ///
    /// Returns:
    /// - `Ok(bytes)` with data - new bytes, in arrival order
    /// - `Ok(empty)` - nothing available yet; the caller sleeps and polls again
    /// - `Err(e)` - the link failed and will not recover
    ///
    /// Must not wait for data or pacing: the caller holds the transport lock
    /// while polling, and the request writer shares that lock.
    async fn poll_available(&mut self) -> Result<Bytes>;

    /// Write a complete outbound frame
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Whether the link can still produce data
    ///
    /// A transport that has closed cleanly (end of a capture, remote hang-up)
    /// reports `false` once its remaining bytes have been handed out.
    fn is_open(&self) -> bool;
}
