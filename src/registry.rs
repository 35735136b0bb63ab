//! Registry of known parameter tags.
//!
//! The registry is built once per connection (from configuration or the
//! built-in defaults) and shared read-only behind an `Arc`.

use std::collections::BTreeMap;

use crate::types::{ParameterDescriptor, ValidRange};
use crate::{Result, StreamError};

/// Transmission fluid temperature
pub const FLUID_TEMPERATURE: u32 = 0x1050_0001;
/// Currently engaged gear
pub const CURRENT_GEAR: u32 = 0x1050_0101;
/// Vehicle speed
pub const VEHICLE_SPEED: u32 = 0x1030_0002;

/// Immutable lookup table from tag to descriptor.
///
/// Ordered by tag so request cycles are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRegistry {
    descriptors: BTreeMap<u32, ParameterDescriptor>,
}

impl Default for ParameterRegistry {
    /// The three reference parameters of the transmission controller.
    fn default() -> Self {
        let descriptors = [
            ParameterDescriptor::new(
                FLUID_TEMPERATURE,
                "Fluid Temperature",
                "°C",
                ValidRange::new(50.0, 400.0),
            ),
            ParameterDescriptor::new(CURRENT_GEAR, "Current Gear", "", ValidRange::new(0.0, 10.0)),
            ParameterDescriptor::new(
                VEHICLE_SPEED,
                "Vehicle Speed",
                "mph",
                ValidRange::new(0.0, 200.0),
            ),
        ];
        Self { descriptors: descriptors.into_iter().map(|d| (d.tag, d)).collect() }
    }
}

impl ParameterRegistry {
    /// Build a registry, rejecting duplicate tags and inverted ranges.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ParameterDescriptor>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for descriptor in descriptors {
            let range = descriptor.valid_range;
            if range.min.is_nan() || range.max.is_nan() || range.min > range.max {
                return Err(StreamError::config_error(
                    "parameters",
                    format!(
                        "Parameter {:#010x} has invalid range {}..={}",
                        descriptor.tag, range.min, range.max
                    ),
                ));
            }
            if let Some(existing) = map.insert(descriptor.tag, descriptor) {
                return Err(StreamError::config_error(
                    "parameters",
                    format!("Duplicate parameter tag {:#010x}", existing.tag),
                ));
            }
        }
        Ok(Self { descriptors: map })
    }

    pub fn get(&self, tag: u32) -> Option<&ParameterDescriptor> {
        self.descriptors.get(&tag)
    }

    pub fn contains(&self, tag: u32) -> bool {
        self.descriptors.contains_key(&tag)
    }

    /// Registered tags in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = u32> + '_ {
        self.descriptors.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
