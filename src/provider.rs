//! Provider trait for record sources

use crate::Result;
use crate::types::NamedRecord;

/// One record delivered by a provider.
#[derive(Debug, Clone)]
pub struct TelemetryUpdate {
    pub record: NamedRecord,
    /// Transmitter packet counter, for radio sources
    pub sequence_number: Option<u32>,
    /// Link retention after this record, for radio sources
    pub retention_ratio: Option<f64>,
}

impl TelemetryUpdate {
    /// An update with no link metadata, as produced from stored data.
    pub fn from_record(record: NamedRecord) -> Self {
        Self { record, sequence_number: None, retention_ratio: None }
    }
}

/// Trait for telemetry record sources
///
/// Providers abstract over a live radio link and stored flash dumps, and handle
/// their own timing internally.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next record
    ///
    /// Returns:
    /// - `Ok(Some(update))` - New record available
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Error occurred
    ///
    /// Each provider handles timing internally:
    /// - Radio: waits on the transport, riding out read timeouts
    /// - Dump: paces stored rows at a playback rate
    async fn next_update(&mut self) -> Result<Option<TelemetryUpdate>>;

    /// Expected records per second, used to decide whether subscribers need throttling
    fn nominal_rate_hz(&self) -> f64;
}
