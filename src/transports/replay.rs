//! Replay transport for raw serial captures

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, trace};

use crate::transport::Transport;
use crate::{Result, StreamError};

/// Replays a capture file in fixed-size chunks at a fixed pace.
///
/// Polls never wait for the pace: a poll that comes early returns nothing,
/// so the caller is not held up while it owns the transport.
///
/// A capture is simply the bytes the bridge printed, text and frames mixed,
/// exactly as they came off the port. Chunk boundaries fall wherever they
/// fall, which exercises the same partial-frame paths a real port does.
pub struct ReplayTransport {
    path: PathBuf,

    /// Whole capture
    data: Bytes,

    /// Next byte to hand out
    position: usize,

    /// Bytes per poll
    chunk_size: usize,

    /// Delay between chunks
    pace: Duration,

    /// Earliest time the next chunk may be handed out
    next_due: Option<Instant>,

    /// Outbound requests swallowed so far
    writes_dropped: u64,
}

impl ReplayTransport {
    /// Open a capture file.
    ///
    /// `pace` is the delay between chunks; `Duration::ZERO` replays as fast
    /// as the driver polls.
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize, pace: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if chunk_size == 0 {
            return Err(StreamError::config_error("chunk_size", "must be greater than zero"));
        }

        let data = std::fs::read(&path).map_err(|e| StreamError::io_error(path.clone(), e))?;
        info!("Opened capture {}: {} bytes in chunks of {}", path.display(), data.len(), chunk_size);

        Ok(Self::from_bytes_at(path, Bytes::from(data), chunk_size, pace))
    }

    /// Replay bytes that are already in memory.
    pub fn from_bytes(data: impl Into<Bytes>, chunk_size: usize, pace: Duration) -> Self {
        Self::from_bytes_at(PathBuf::from("<memory>"), data.into(), chunk_size.max(1), pace)
    }

    fn from_bytes_at(path: PathBuf, data: Bytes, chunk_size: usize, pace: Duration) -> Self {
        Self { path, data, position: 0, chunk_size, pace, next_due: None, writes_dropped: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fraction of the capture handed out so far, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.data.is_empty() {
            return 1.0;
        }
        self.position as f64 / self.data.len() as f64
    }

    pub fn writes_dropped(&self) -> u64 {
        self.writes_dropped
    }
}

#[async_trait::async_trait]
impl Transport for ReplayTransport {
    async fn poll_available(&mut self) -> Result<Bytes> {
        if self.position >= self.data.len() {
            return Ok(Bytes::new());
        }

        if !self.pace.is_zero() {
            let now = Instant::now();
            if self.next_due.is_some_and(|due| now < due) {
                return Ok(Bytes::new());
            }
            self.next_due = Some(now + self.pace);
        }

        let end = (self.position + self.chunk_size).min(self.data.len());
        let chunk = self.data.slice(self.position..end);
        self.position = end;
        trace!("Replay chunk {} bytes ({:.1}%)", chunk.len(), self.progress() * 100.0);

        if self.position >= self.data.len() {
            debug!("Reached end of capture {}", self.path.display());
        }
        Ok(chunk)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writes_dropped += 1;
        trace!("Replay dropped {} byte write", data.len());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.position < self.data.len()
    }
}
