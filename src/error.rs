//! Error types for stream framing and parameter decoding.
//!
//! Two families of errors exist and they never mix:
//!
//! - [`DecodeError`] describes a single bad binary candidate. It is always
//!   recovered locally by the [`StreamProcessor`](crate::processor::StreamProcessor)
//!   (resynchronize one byte forward, bump a counter) and never escapes it.
//! - [`StreamError`] describes failures of the connection as a whole:
//!   transport read/write failures, configuration problems and timeouts.
//!   Transport errors end the current connection and are reported, not retried.
//!
//! ## Recovery
//!
//! ```rust
//! use canstream::StreamError;
//!
//! let error = StreamError::transport_failed("port closed by peer");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for stream operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Why a binary candidate could not be turned into a usable sample.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Data length {length} exceeds 8 bytes")]
    InvalidLength { length: u8 },

    #[error("Tag {tag:#010x} is outside the 29-bit identifier range")]
    InvalidTag { tag: u32 },

    #[error("Tag {tag:#010x} is not a registered parameter")]
    UnknownParameter { tag: u32 },

    #[error("Unexpected operation code {opcode:#04x}")]
    UnexpectedOperation { opcode: u8 },

    #[error("Parameter payload carries {length} bytes, expected 8")]
    TruncatedPayload { length: u8 },
}

/// Main error type for connection-level operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Transport is closed")]
    Closed,
}

impl StreamError {
    /// Returns whether reconnecting could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport { .. } => true,
            StreamError::Timeout { .. } => true,
            StreamError::Closed => true,
            StreamError::Io { .. } => false,
            StreamError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::Transport { .. } => vec![
                "Check that the ECU is powered and the USB cable is seated",
                "Verify the serial port name and baud rate",
                "Reconnect once the device re-enumerates",
            ],
            StreamError::Io { .. } => vec![
                "Check the capture file exists and is readable",
                "Check file permissions",
            ],
            StreamError::Config { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Verify every parameter range has min <= max",
                "Remove unknown or misspelled keys",
            ],
            StreamError::Timeout { .. } => vec![
                "Increase the shutdown timeout",
                "Check for a stalled transport write",
            ],
            StreamError::Closed => vec![
                "Open a new connection",
                "Check whether the replay capture reached its end",
            ],
        }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        StreamError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for file errors with path context.
    pub fn io_error(path: PathBuf, source: std::io::Error) -> Self {
        StreamError::Io { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        StreamError::Config { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Transport { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

impl From<serde_yaml_ng::Error> for StreamError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        StreamError::Config { context: "YAML".to_string(), details: err.to_string() }
    }
}
