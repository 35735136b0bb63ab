//! Update rate control for sample subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery rate for a sample subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every sample as soon as it is decoded
    Native,

    /// At most this many deliveries per second per parameter
    /// (latest value wins within each interval)
    Max(u32),
}

impl UpdateRate {
    /// Interval between deliveries, `None` when unthrottled.
    ///
    /// `Max(0)` is treated as `Native`.
    pub fn interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}
