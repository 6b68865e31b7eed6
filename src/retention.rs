//! Packet retention tracking
//!
//! Link quality is estimated from gaps in the transmitter's packet counter. Each
//! received packet pushes a `1` into a fixed-size window; a forward jump of `n`
//! first pushes `n - 1` zeros for the packets that never arrived.
//!
//! The ratio is an approximation. Duplicates and reordered packets count as
//! normal progress, and a backward jump (a transmitter reboot resets its counter)
//! counts as zero loss. Until the window has filled the ratio reads `1.0`.

use std::collections::VecDeque;
use tracing::{debug, trace};

/// Window size used by the ground station dashboard.
pub const DEFAULT_RETENTION_WINDOW: usize = 100;

/// Rolling record of received and missing packets for one radio session.
///
/// Not synchronized; owned by a single decode loop.
#[derive(Debug, Clone)]
pub struct RetentionTracker {
    window: VecDeque<bool>,
    capacity: usize,
    received_in_window: usize,
    last_sequence_number: Option<u32>,
    inferred_missing: u64,
    backward_jumps: u64,
}

impl Default for RetentionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_WINDOW)
    }
}

impl RetentionTracker {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            received_in_window: 0,
            last_sequence_number: None,
            inferred_missing: 0,
            backward_jumps: 0,
        }
    }

    fn push(&mut self, received: bool) {
        if self.window.len() == self.capacity && self.window.pop_front() == Some(true) {
            self.received_in_window -= 1;
        }
        self.window.push_back(received);
        if received {
            self.received_in_window += 1;
        }
    }

    /// Record a received packet. Returns how many packets were inferred missing.
    pub fn record_packet(&mut self, sequence_number: u32) -> u64 {
        let Some(last) = self.last_sequence_number.replace(sequence_number) else {
            self.push(true);
            return 0;
        };

        let diff = sequence_number as i64 - last as i64;
        let missing = if diff > 1 { (diff - 1) as u64 } else { 0 };

        if diff < 0 {
            self.backward_jumps += 1;
            debug!(from = last, to = sequence_number, "Sequence number went backwards, counted as no loss");
        }

        // Zeros beyond the capacity would be evicted straight away.
        for _ in 0..missing.min(self.capacity as u64) {
            self.push(false);
        }
        self.push(true);
        self.inferred_missing += missing;

        trace!(sequence_number, missing, ratio = self.retention_ratio(), "Recorded packet");
        missing
    }

    /// Fraction of the window that was received, or `1.0` until the window fills.
    pub fn retention_ratio(&self) -> f64 {
        if self.window.len() < self.capacity {
            return 1.0;
        }
        self.received_in_window as f64 / self.capacity as f64
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries currently in the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.capacity
    }

    pub fn last_sequence_number(&self) -> Option<u32> {
        self.last_sequence_number
    }

    /// Packets inferred missing over the tracker's lifetime.
    pub fn inferred_missing(&self) -> u64 {
        self.inferred_missing
    }

    pub fn backward_jumps(&self) -> u64 {
        self.backward_jumps
    }

    /// Window contents, oldest first.
    pub fn window(&self) -> impl Iterator<Item = bool> + '_ {
        self.window.iter().copied()
    }

    /// Forget everything, including the lifetime counters.
    pub fn reset(&mut self) {
        self.window.clear();
        self.received_in_window = 0;
        self.last_sequence_number = None;
        self.inferred_missing = 0;
        self.backward_jumps = 0;
    }
}
