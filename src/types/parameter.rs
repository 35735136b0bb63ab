//! Parameter descriptors and decoded samples

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Inclusive plausibility window for a parameter value.
///
/// Used to pick the byte order of a float whose wire encoding is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidRange {
    pub min: f32,
    pub max: f32,
}

impl ValidRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// NaN is never in range.
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Static registry entry describing one known parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Wire tag of the parameter
    pub tag: u32,
    /// Display name (e.g., "Vehicle Speed")
    pub name: String,
    /// Unit of measurement, empty for dimensionless values
    pub unit: String,
    /// Plausible value range
    pub valid_range: ValidRange,
}

impl ParameterDescriptor {
    pub fn new(tag: u32, name: impl Into<String>, unit: impl Into<String>, range: ValidRange) -> Self {
        Self { tag, name: name.into(), unit: unit.into(), valid_range: range }
    }
}

/// Byte order a sample's float value was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn read_f32(self, bytes: [u8; 4]) -> f32 {
        match self {
            ByteOrder::Little => f32::from_le_bytes(bytes),
            ByteOrder::Big => f32::from_be_bytes(bytes),
        }
    }

    pub fn write_f32(self, value: f32) -> [u8; 4] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

/// One decoded parameter read-response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSample {
    pub tag: u32,
    pub value: f32,
    pub source_channel: u8,
    pub request_id: u8,
    pub observed_at: SystemTime,
    /// Byte order chosen by the range check
    pub byte_order: ByteOrder,
    /// False when neither byte order produced a plausible value
    pub in_range: bool,
}
