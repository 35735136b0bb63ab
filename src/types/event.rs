//! Events published by the draining task

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ParameterSample, StatsSnapshot};

/// Prefixes the ECU firmware uses for diagnostic output worth surfacing.
const DIAGNOSTIC_MARKERS: &[&str] =
    &["ParameterRegistry:", "SerialBridge:", "MessageBus:", "Sending binary response"];

/// A newline-terminated run of debug text from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    raw: Bytes,
}

impl TextLine {
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self { raw: raw.into() }
    }

    /// Raw bytes including the trailing newline.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Lossy UTF-8 text with the line terminator removed.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw).trim_end_matches(['\r', '\n']).to_string()
    }

    /// The first known diagnostic marker contained in the line, if any.
    pub fn marker(&self) -> Option<&'static str> {
        let text = String::from_utf8_lossy(&self.raw);
        DIAGNOSTIC_MARKERS.iter().copied().find(|marker| text.contains(marker))
    }
}

/// Lifecycle of a stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    Connected,
    Draining,
    Disconnected,
}

/// Everything observers can receive from a running connection.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Text(Arc<TextLine>),
    Sample(Arc<ParameterSample>),
    Stats(StatsSnapshot),
    /// Terminal event; `reason` is `None` for a requested stop
    Disconnected { reason: Option<String> },
}
