//! Radio packet type

use std::time::Instant;

use super::RawField;

/// One decoded radio frame.
///
/// Created by the radio decoder per framed unit and consumed right away by the
/// record assembler and the retention tracker.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Flight computer clock in milliseconds
    pub timestamp_ms: u32,

    /// Monotonic packet counter assigned by the transmitter
    pub sequence_number: u32,

    /// Fields in wire order
    pub fields: Vec<RawField>,

    /// When the ground station finished reading the packet header
    pub receive_instant: Instant,
}

impl Packet {
    pub fn new(timestamp_ms: u32, sequence_number: u32) -> Self {
        Self { timestamp_ms, sequence_number, fields: Vec::new(), receive_instant: Instant::now() }
    }

    /// Flight computer clock in seconds.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }
}
