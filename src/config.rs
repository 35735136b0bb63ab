//! Connection configuration.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```rust
//! use canstream::StreamConfig;
//!
//! let config = StreamConfig::from_yaml_str(
//!     r#"
//! request_interval_ms: 500
//! parameters:
//!   - tag: 0x10500001
//!     name: Fluid Temperature
//!     unit: "°F"
//!     min: 120.0
//!     max: 300.0
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.request_interval_ms, 500);
//! assert_eq!(config.registry().unwrap().len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::buffer::DEFAULT_CAPACITY;
use crate::codec::DEFAULT_SENDER_CHANNEL;
use crate::registry::ParameterRegistry;
use crate::store::DEFAULT_HISTORY_LEN;
use crate::types::{ParameterDescriptor, ValidRange};
use crate::{Result, StreamError};

/// One parameter entry in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub tag: u32,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub min: f32,
    pub max: f32,
}

impl From<&ParameterConfig> for ParameterDescriptor {
    fn from(cfg: &ParameterConfig) -> Self {
        ParameterDescriptor::new(cfg.tag, cfg.name.clone(), cfg.unit.clone(), ValidRange::new(cfg.min, cfg.max))
    }
}

/// Tunables for a stream connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Receive buffer cap in bytes
    pub buffer_capacity: usize,
    /// Idle sleep between empty transport polls
    pub poll_interval_ms: u64,
    /// Period of stats snapshots
    pub stats_interval_ms: u64,
    /// Period of a full request cycle
    pub request_interval_ms: u64,
    /// Gap between requests within a cycle
    pub inter_request_delay_ms: u64,
    /// Samples kept per parameter
    pub history_len: usize,
    /// Channel id stamped on outbound requests
    pub sender_channel: u8,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
    /// Upper bound on waiting for tasks during disconnect
    pub shutdown_timeout_ms: u64,
    /// Whether the request task runs at all
    pub requests_enabled: bool,
    /// Known parameters; empty means the built-in defaults
    pub parameters: Vec<ParameterConfig>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            poll_interval_ms: 5,
            stats_interval_ms: 1000,
            request_interval_ms: 1000,
            inter_request_delay_ms: 200,
            history_len: DEFAULT_HISTORY_LEN,
            sender_channel: DEFAULT_SENDER_CHANNEL,
            event_capacity: 256,
            shutdown_timeout_ms: 500,
            requests_enabled: true,
            parameters: Vec::new(),
        }
    }
}

impl StreamConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: StreamConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| StreamError::io_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("buffer_capacity", self.buffer_capacity as u64),
            ("poll_interval_ms", self.poll_interval_ms),
            ("stats_interval_ms", self.stats_interval_ms),
            ("request_interval_ms", self.request_interval_ms),
            ("history_len", self.history_len as u64),
            ("event_capacity", self.event_capacity as u64),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(StreamError::config_error(field, "must be greater than zero"));
            }
        }
        if self.buffer_capacity < crate::framing::WIRE_FRAME_SIZE {
            return Err(StreamError::config_error(
                "buffer_capacity",
                format!("must hold at least one frame ({} bytes)", crate::framing::WIRE_FRAME_SIZE),
            ));
        }
        self.registry().map(|_| ())
    }

    /// Build the parameter registry this config describes.
    pub fn registry(&self) -> Result<ParameterRegistry> {
        if self.parameters.is_empty() {
            return Ok(ParameterRegistry::default());
        }
        ParameterRegistry::from_descriptors(self.parameters.iter().map(ParameterDescriptor::from))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CURRENT_GEAR, FLUID_TEMPERATURE};
    use anyhow::Context;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = StreamConfig::from_yaml_str("{}").expect("defaults are valid");
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.registry().expect("registry").len(), 3);
    }

    #[test]
    fn parameters_override_registry() {
        let config = StreamConfig::from_yaml_str(
            "parameters:\n  - tag: 0x10500101\n    name: Gear\n    min: 0\n    max: 6\n",
        )
        .expect("valid");
        let registry = config.registry().expect("registry");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(CURRENT_GEAR).map(|d| d.valid_range.max), Some(6.0));
        assert!(!registry.contains(FLUID_TEMPERATURE));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = StreamConfig::from_yaml_str("baud_rate: 115200\n").unwrap_err();
        assert!(matches!(err, StreamError::Config { .. }));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        assert!(StreamConfig::from_yaml_str("poll_interval_ms: 0\n").is_err());
        assert!(StreamConfig::from_yaml_str("buffer_capacity: 10\n").is_err());
    }

    #[test]
    fn loads_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "history_len: 10\nrequests_enabled: false")?;

        let config = StreamConfig::from_path(file.path()).context("load config")?;
        assert_eq!(config.history_len, 10);
        assert!(!config.requests_enabled);
        Ok(())
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = StreamConfig::from_path("/nonexistent/canstream.yaml").unwrap_err();
        assert!(matches!(err, StreamError::Io { .. }));
    }
}
