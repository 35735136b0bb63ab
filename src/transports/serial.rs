//! Serial port transport (USB CDC bridge)

use bytes::Bytes;
use futures::FutureExt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{info, trace, warn};

use crate::transport::Transport;
use crate::{Result, StreamError};

const READ_CHUNK: usize = 512;

/// Live link to the ECU bridge over a serial port
pub struct SerialTransport {
    port_name: String,
    stream: SerialStream,
    open: bool,
    scratch: Box<[u8; READ_CHUNK]>,
}

impl SerialTransport {
    /// Open `port` at `baud`, 8N1 without flow control.
    pub fn open(port: &str, baud: u32) -> Result<Self> {
        let stream = tokio_serial::new(port, baud)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| {
                StreamError::transport_failed_with_source(format!("Failed to open {}", port), Box::new(e))
            })?;

        info!(port, baud, "Opened serial port");
        Ok(Self { port_name: port.to_string(), stream, open: true, scratch: Box::new([0; READ_CHUNK]) })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    async fn poll_available(&mut self) -> Result<Bytes> {
        if !self.open {
            return Ok(Bytes::new());
        }

        // Only take what is already there; never park the draining task on the port.
        match self.stream.read(&mut self.scratch[..]).now_or_never() {
            None => Ok(Bytes::new()),
            Some(Ok(0)) => {
                warn!("Serial port {} reached end of stream", self.port_name);
                self.open = false;
                Ok(Bytes::new())
            }
            Some(Ok(n)) => {
                trace!("Serial read {} bytes", n);
                Ok(Bytes::copy_from_slice(&self.scratch[..n]))
            }
            Some(Err(e)) => {
                self.open = false;
                Err(StreamError::transport_failed_with_source(
                    format!("Read from {} failed", self.port_name),
                    Box::new(e),
                ))
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(StreamError::Closed);
        }
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
