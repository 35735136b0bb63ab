//! In-process transport driven from a handle
//!
//! Used by tests, benches and anything that already has the bytes in memory
//! (a bridge forwarding from another process, for instance).

use bytes::{Bytes, BytesMut};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::transport::Transport;
use crate::{Result, StreamError};

enum Inbound {
    Data(Bytes),
    Fail(String),
    Close,
}

type WriteLog = Arc<Mutex<Vec<Bytes>>>;

/// Transport half of an in-memory pair
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    writes: WriteLog,
    open: bool,
    pending_failure: Option<String>,
}

/// Controlling half of an in-memory pair
#[derive(Clone)]
pub struct MemoryHandle {
    inbound: mpsc::UnboundedSender<Inbound>,
    writes: WriteLog,
}

impl MemoryTransport {
    /// Create a connected transport and the handle that feeds it.
    pub fn pair() -> (MemoryTransport, MemoryHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writes = WriteLog::default();
        let transport = MemoryTransport {
            inbound: rx,
            writes: Arc::clone(&writes),
            open: true,
            pending_failure: None,
        };
        (transport, MemoryHandle { inbound: tx, writes })
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn poll_available(&mut self) -> Result<Bytes> {
        if let Some(reason) = self.pending_failure.take() {
            self.open = false;
            return Err(StreamError::transport_failed(reason));
        }

        let mut out = BytesMut::new();
        while self.open {
            match self.inbound.try_recv() {
                Ok(Inbound::Data(bytes)) => out.extend_from_slice(&bytes),
                Ok(Inbound::Fail(reason)) => {
                    if out.is_empty() {
                        self.open = false;
                        return Err(StreamError::transport_failed(reason));
                    }
                    // Hand out what arrived first; fail on the next poll.
                    self.pending_failure = Some(reason);
                    break;
                }
                Ok(Inbound::Close) | Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("Memory transport closed by handle");
                    self.open = false;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
            }
        }

        trace!("Memory transport poll: {} bytes", out.len());
        Ok(out.freeze())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(StreamError::Closed);
        }
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).push(Bytes::copy_from_slice(data));
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open || self.pending_failure.is_some()
    }
}

impl MemoryHandle {
    /// Queue bytes for the next poll. Returns `false` once the transport is gone.
    pub fn push(&self, data: impl Into<Bytes>) -> bool {
        self.inbound.send(Inbound::Data(data.into())).is_ok()
    }

    /// Make the next poll fail with `reason` (after any bytes queued earlier).
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.inbound.send(Inbound::Fail(reason.into()));
    }

    /// Close the link cleanly after the bytes queued so far.
    pub fn close(&self) {
        let _ = self.inbound.send(Inbound::Close);
    }

    /// Every frame written so far, oldest first.
    pub fn writes(&self) -> Vec<Bytes> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
