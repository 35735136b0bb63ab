//! Framing, decoding and parameter polling for ECU serial streams.
//!
//! The ECU bridge prints free-form debug text and binary parameter frames on
//! the same serial link. canstream carves the two apart without losing
//! synchronization, decodes parameter read-responses, keeps the latest value
//! and a short history per parameter, and polls the ECU with read-requests.
//!
//! # Features
//!
//! - **Resynchronizing framer**: sentinel-prefixed fixed-size frames, text
//!   lines in between, one-byte resync on corrupt candidates
//! - **Non-blocking**: partial frames wait in a bounded buffer
//! - **Async**: draining and request tasks on tokio with cooperative shutdown
//! - **Pluggable transports**: serial port (feature `serial`), capture replay,
//!   in-memory
//!
//! ## Example (capture replay)
//!
//! ```rust,no_run
//! use canstream::{CanStream, StreamConfig, UpdateRate};
//! use canstream::registry::FLUID_TEMPERATURE;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> canstream::Result<()> {
//!     let connection = CanStream::open_capture("bench-run.bin", StreamConfig::default()).await?;
//!     let mut temps = connection.subscribe(FLUID_TEMPERATURE, UpdateRate::Max(4))?;
//!
//!     while let Some(sample) = temps.next().await {
//!         println!("{:.1} °C (request {})", sample.value, sample.request_id);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Protocol layers
pub mod buffer;
pub mod codec;
pub mod framing;
pub mod processor;
pub mod registry;
pub mod sink;
pub mod store;

// Configuration
pub mod config;

// Stream-based connection architecture
pub mod connection;
pub mod driver;
pub mod stream;
pub mod transport;
pub mod transports;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::{ParameterConfig, StreamConfig};
pub use connection::StreamConnection;
pub use processor::StreamProcessor;
pub use registry::ParameterRegistry;
pub use sink::StreamSink;
pub use transport::Transport;

use std::path::Path;
use std::time::Duration;
use transports::ReplayTransport;

/// Bytes handed out per replay poll.
pub const CAPTURE_CHUNK_SIZE: usize = 64;

/// Replay pace, roughly the rate of a 115200 baud link.
pub const CAPTURE_PACE: Duration = Duration::from_millis(5);

/// Unified entry point for stream connections.
///
/// # Examples
///
/// ## Serial port (feature `serial`)
/// ```rust,ignore
/// use canstream::{CanStream, StreamConfig};
///
/// #[tokio::main]
/// async fn main() -> canstream::Result<()> {
///     let connection = CanStream::connect_serial("/dev/ttyACM0", 115_200, StreamConfig::default()).await?;
///     // Use connection...
///     Ok(())
/// }
/// ```
///
/// ## Any transport
/// ```rust
/// use canstream::{CanStream, StreamConfig};
/// use canstream::transports::MemoryTransport;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> canstream::Result<()> {
///     let (transport, handle) = MemoryTransport::pair();
///     let connection = CanStream::attach(transport, StreamConfig::default()).await?;
///     handle.push(&b"SerialBridge: ready\n"[..]);
///     connection.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct CanStream;

impl CanStream {
    /// Start a connection over any transport.
    pub async fn attach<T: Transport>(transport: T, config: StreamConfig) -> Result<StreamConnection> {
        StreamConnection::open(transport, config).await
    }

    /// Replay a raw capture file at roughly serial speed.
    ///
    /// The connection disconnects by itself at the end of the capture.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the configuration is
    /// invalid.
    pub async fn open_capture<P: AsRef<Path>>(path: P, config: StreamConfig) -> Result<StreamConnection> {
        let transport = ReplayTransport::open(path, CAPTURE_CHUNK_SIZE, CAPTURE_PACE)?;
        StreamConnection::open(transport, config).await
    }

    /// Open a serial port and start a connection over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be opened or the configuration is
    /// invalid.
    #[cfg(feature = "serial")]
    pub async fn connect_serial(port: &str, baud: u32, config: StreamConfig) -> Result<StreamConnection> {
        let transport = transports::SerialTransport::open(port, baud)?;
        StreamConnection::open(transport, config).await
    }
}
