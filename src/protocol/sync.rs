//! Frame start detection
//!
//! The radio link is a continuous byte stream with no length prefix. A receiver
//! that connects mid-packet, or loses bytes to interference, finds the next frame
//! by scanning for the 4-byte start marker.

use std::io::Read;
use tracing::{debug, trace};

use super::byte_source::ByteSource;
use crate::Result;
use crate::error::StreamStop;

/// Marker preceding every radio packet.
pub const RADIO_START_MARKER: [u8; 4] = [0x00, 0x00, 0x00, 0x33];

/// Marker terminating every radio packet.
pub const RADIO_END_MARKER: [u8; 4] = [0x00, 0x00, 0x00, 0x34];

/// Result of one synchronization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The full marker was consumed; the frame header follows.
    Found,
    /// The transport timed out mid-search. Partial match progress is kept.
    NeedMoreInput,
    /// The transport ended without another marker.
    EndOfStream,
}

/// Scans a byte stream for a fixed marker.
///
/// Matching compares the last four bytes seen against the marker, so a run of
/// zero bytes before the marker (`00 00 00 00 33`) still synchronizes.
#[derive(Debug, Clone)]
pub struct FrameSynchronizer {
    marker: [u8; 4],
    window: [u8; 4],
    seen: usize,
    pending: u64,
    noise_bytes: u64,
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new(RADIO_START_MARKER)
    }
}

impl FrameSynchronizer {
    pub fn new(marker: [u8; 4]) -> Self {
        Self { marker, window: [0; 4], seen: 0, pending: 0, noise_bytes: 0 }
    }

    pub fn marker(&self) -> [u8; 4] {
        self.marker
    }

    /// Feed one byte. Returns `true` when it completes the marker.
    pub fn push(&mut self, byte: u8) -> bool {
        self.window.rotate_left(1);
        self.window[3] = byte;
        self.seen = (self.seen + 1).min(4);
        self.pending += 1;

        if self.seen == 4 && self.window == self.marker {
            let noise = self.pending - self.marker.len() as u64;
            if noise > 0 {
                debug!(noise_bytes = noise, "Discarded bytes before frame start");
            }
            self.noise_bytes += noise;
            self.reset();
            return true;
        }
        false
    }

    /// Consume bytes from `source` until the marker is found or the source stops.
    pub fn synchronize<R: Read>(&mut self, source: &mut ByteSource<R>) -> Result<SyncOutcome> {
        loop {
            match source.next_byte()? {
                Ok(byte) => {
                    if self.push(byte) {
                        trace!("Frame start found");
                        return Ok(SyncOutcome::Found);
                    }
                }
                Err(StreamStop::Timeout) => return Ok(SyncOutcome::NeedMoreInput),
                Err(StreamStop::EndOfStream) => {
                    self.noise_bytes += self.pending;
                    self.reset();
                    return Ok(SyncOutcome::EndOfStream);
                }
            }
        }
    }

    /// Forget any partial match.
    pub fn reset(&mut self) {
        self.window = [0; 4];
        self.seen = 0;
        self.pending = 0;
    }

    /// Bytes discarded as noise over this synchronizer's lifetime.
    pub fn noise_bytes(&self) -> u64 {
        self.noise_bytes
    }

    /// Marker bytes matched so far in the current search.
    pub fn partial_match_len(&self) -> usize {
        (1..=self.seen.min(3))
            .rev()
            .find(|&n| self.window[4 - n..] == self.marker[..n])
            .unwrap_or(0)
    }
}
