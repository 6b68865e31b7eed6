//! Delivery rate control for record streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often subscribers want records.
///
/// The radio link delivers at whatever rate the firmware transmits; a dashboard
/// refreshing at 10 Hz only needs the latest record per refresh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every record as it is decoded
    Native,

    /// At most this many records per second, latest wins.
    /// A rate at or above the source rate behaves like `Native`.
    Max(u32),
}

impl UpdateRate {
    /// Resolve against the source's nominal rate.
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= source_hz => UpdateRate::Native,
            other => other,
        }
    }

    /// Throttle interval after normalization, if throttling applies.
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
