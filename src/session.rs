//! One live radio link
//!
//! A [`RadioSession`] wires the per-link components together: a decoder over the
//! transport, a retention tracker fed by each packet's sequence number, and an
//! assembler that names the fields. Every session owns its own instances, so any
//! number of links can run side by side against a shared schema.

use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;
use crate::assembler::{LatestValues, RecordAssembler};
use crate::error::{DecodeError, StreamStop};
use crate::protocol::{DecoderStats, RadioDecoder, Termination};
use crate::retention::RetentionTracker;
use crate::schema::SchemaRegistry;
use crate::types::NamedRecord;

/// Result of decoding one packet on a session.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub record: NamedRecord,
    pub sequence_number: u32,
    /// Packets inferred missing just before this one
    pub missing_before: u64,
    pub retention_ratio: f64,
    pub termination: Termination,
    pub skipped: Vec<DecodeError>,
}

/// Decode state for one radio link.
pub struct RadioSession<R> {
    decoder: RadioDecoder<R>,
    tracker: RetentionTracker,
    assembler: RecordAssembler,
    latest: LatestValues,
}

impl<R: Read> RadioSession<R> {
    pub fn new(reader: R, registry: Arc<SchemaRegistry>) -> Self {
        info!(schema_version = registry.version(), "Radio session opened");
        Self {
            decoder: RadioDecoder::new(reader, registry.clone()),
            tracker: RetentionTracker::default(),
            assembler: RecordAssembler::new(registry),
            latest: LatestValues::new(),
        }
    }

    pub fn with_retention_window(mut self, window: usize) -> Self {
        self.tracker = RetentionTracker::new(window);
        self
    }

    pub fn with_max_packet_len(mut self, max_packet_len: usize) -> Self {
        self.decoder = self.decoder.with_max_packet_len(max_packet_len);
        self
    }

    /// Decode at most one packet.
    ///
    /// Returns `Ok(None)` when the transport timed out or ended without a
    /// packet; [`is_exhausted`](Self::is_exhausted) tells the two apart.
    pub fn poll(&mut self) -> Result<Option<SessionUpdate>> {
        let Some(decoded) = self.decoder.decode_next()? else {
            return Ok(None);
        };

        let packet = decoded.packet;
        let missing_before = self.tracker.record_packet(packet.sequence_number);
        let record = self.assembler.assemble_packet(&packet);
        self.latest.merge(&record, Some(packet.sequence_number), packet.receive_instant);

        let retention_ratio = self.tracker.retention_ratio();
        if missing_before > 0 {
            debug!(
                sequence_number = packet.sequence_number,
                missing = missing_before,
                retention_ratio,
                "Packets lost"
            );
        }

        Ok(Some(SessionUpdate {
            record,
            sequence_number: packet.sequence_number,
            missing_before,
            retention_ratio,
            termination: decoded.termination,
            skipped: decoded.skipped,
        }))
    }

    /// Retention ratio, updated once per decoded packet.
    pub fn retention_ratio(&self) -> f64 {
        self.tracker.retention_ratio()
    }

    pub fn tracker(&self) -> &RetentionTracker {
        &self.tracker
    }

    pub fn latest(&self) -> &LatestValues {
        &self.latest
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        self.decoder.registry()
    }

    /// Why the last poll produced nothing.
    pub fn last_idle(&self) -> Option<StreamStop> {
        self.decoder.last_idle()
    }

    pub fn is_exhausted(&self) -> bool {
        self.decoder.is_exhausted()
    }

    /// Close the session, returning the transport.
    pub fn close(self) -> R {
        let stats = self.decoder.stats();
        info!(
            packets = stats.packets,
            complete = stats.complete_packets,
            retention_ratio = self.tracker.retention_ratio(),
            "Radio session closed"
        );
        self.decoder.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RadioFrameBuilder, ScriptedReader, test_registry};
    use std::io::Cursor;

    #[test]
    fn poll_feeds_tracker_and_latest_values() {
        let mut bytes = Vec::new();
        bytes.extend(RadioFrameBuilder::new(1000, 1).single(8, 100.0).single(6, 20.0).build());
        bytes.extend(RadioFrameBuilder::new(1100, 4).single(8, 110.0).build());

        let mut session = RadioSession::new(Cursor::new(bytes), test_registry()).with_retention_window(4);

        let first = session.poll().unwrap().unwrap();
        assert_eq!(first.sequence_number, 1);
        assert_eq!(first.missing_before, 0);
        assert_eq!(first.retention_ratio, 1.0);

        let second = session.poll().unwrap().unwrap();
        assert_eq!(second.missing_before, 2);
        assert_eq!(second.retention_ratio, 0.5);
        assert_eq!(second.record.get_f64("ALTITUDE"), Some(110.0));
        assert!(!second.record.contains("TEMPERATURE"));

        assert_eq!(session.latest().get_f64("ALTITUDE"), Some(110.0));
        assert_eq!(session.latest().get_f64("TEMPERATURE"), Some(20.0));
        assert_eq!(session.latest().timestamp_secs(), Some(1.1));

        assert!(session.poll().unwrap().is_none());
        assert!(session.is_exhausted());
    }

    #[test]
    fn truncated_packet_still_counts_for_retention() {
        let bytes = RadioFrameBuilder::new(5, 7).single(8, 1.0).build_without_end();
        let mut session = RadioSession::new(Cursor::new(bytes), test_registry());

        let update = session.poll().unwrap().unwrap();
        assert!(!update.termination.is_complete());
        assert_eq!(update.record.get_f64("ALTITUDE"), Some(1.0));
        assert_eq!(session.tracker().last_sequence_number(), Some(7));
    }

    #[test]
    fn idle_poll_does_not_touch_retention() {
        let reader = ScriptedReader::new().timeout();
        let mut session = RadioSession::new(reader, test_registry());
        assert!(session.poll().unwrap().is_none());
        assert_eq!(session.last_idle(), Some(StreamStop::Timeout));
        assert!(session.tracker().is_empty());
    }

    #[test]
    fn sessions_share_a_registry_independently() {
        let registry = test_registry();
        let a = RadioFrameBuilder::new(1, 1).single(8, 1.0).build();
        let b = RadioFrameBuilder::new(1, 50).single(8, 2.0).build();

        let mut first = RadioSession::new(Cursor::new(a), registry.clone());
        let mut second = RadioSession::new(Cursor::new(b), registry.clone());
        first.poll().unwrap().unwrap();
        second.poll().unwrap().unwrap();

        assert_eq!(first.tracker().last_sequence_number(), Some(1));
        assert_eq!(second.tracker().last_sequence_number(), Some(50));
        assert_eq!(first.latest().get_f64("ALTITUDE"), Some(1.0));
        assert_eq!(second.latest().get_f64("ALTITUDE"), Some(2.0));
        assert!(Arc::ptr_eq(first.registry(), second.registry()));
    }
}
