//! Radio packet decoding
//!
//! A radio frame on the wire:
//!
//! ```text
//! START_MARKER   00 00 00 33
//! TIMESTAMP      u32 big-endian, milliseconds
//! SEQ_NUMBER     u32 big-endian
//! repeat {
//!   FIELD_ID     1 byte
//!   PAYLOAD      4 bytes (single) or 12 bytes (group)
//! } until END_MARKER 00 00 00 34
//! ```
//!
//! The end marker is recognised by reading each field id together with the first
//! three payload bytes and comparing the four against the marker.
//!
//! Field-level problems never fail a session. Unknown ids are skipped, and a
//! stream that stops mid-packet returns the fields decoded so far. Both cases
//! are reported on the [`DecodedPacket`] so callers can see exactly what happened.

use std::io::Read;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::byte_source::ByteSource;
use super::sync::{FrameSynchronizer, RADIO_END_MARKER, SyncOutcome};
use crate::Result;
use crate::error::{DecodeError, StreamStop};
use crate::schema::SchemaRegistry;
use crate::types::{FieldKind, Packet, RawField, RawPayload, Value};

/// Default limit on a packet body before the decoder gives up and resynchronises.
pub const DEFAULT_MAX_PACKET_LEN: usize = 255;

const HEADER_LEN: usize = 8;

/// How a packet ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The end marker was read; the packet is complete.
    EndMarker,
    /// The stream stopped mid-packet. Fields before the cut are kept.
    Truncated(DecodeError),
    /// The body ran past the packet length limit without an end marker.
    Oversized { limit: usize },
}

impl Termination {
    pub fn is_complete(&self) -> bool {
        matches!(self, Termination::EndMarker)
    }

    /// The decode problem that ended the packet early, if any.
    pub fn error(&self) -> Option<DecodeError> {
        match self {
            Termination::EndMarker => None,
            Termination::Truncated(e) => Some(e.clone()),
            Termination::Oversized { limit } => Some(DecodeError::Oversized { limit: *limit }),
        }
    }
}

/// One packet plus an account of how it was decoded.
#[derive(Debug, Clone)]
pub struct DecodedPacket {
    pub packet: Packet,
    pub termination: Termination,
    /// Fields that were skipped without ending the packet
    pub skipped: Vec<DecodeError>,
}

impl DecodedPacket {
    pub fn is_complete(&self) -> bool {
        self.termination.is_complete()
    }
}

/// Counters over a decoder's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub packets: u64,
    pub complete_packets: u64,
    pub truncated_packets: u64,
    pub oversized_packets: u64,
    /// Frames whose timestamp/sequence header could not be read
    pub dropped_headers: u64,
    pub skipped_fields: u64,
    pub noise_bytes: u64,
}

/// Decode a single-field payload. The timestamp field is an unsigned integer,
/// every other single field a float; both are big-endian on the radio link.
pub fn decode_single(bytes: [u8; 4], is_timestamp: bool) -> Value {
    if is_timestamp {
        Value::UInt(u32::from_be_bytes(bytes))
    } else {
        Value::Float(f32::from_be_bytes(bytes))
    }
}

/// Decode a group payload: each 4-byte chunk is reversed and read as a
/// little-endian float, matching how the firmware packs its sensor triples.
pub fn decode_group(bytes: &[u8; 12]) -> [f32; 3] {
    let mut values = [0f32; 3];
    for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
        let swapped = [chunk[3], chunk[2], chunk[1], chunk[0]];
        *value = f32::from_le_bytes(swapped);
    }
    values
}

/// Incremental radio decoder over one transport.
///
/// Owns the synchronizer and the read buffer for a single link. Each call to
/// [`decode_next`](Self::decode_next) decodes at most one packet and returns
/// when the transport times out, so a poll loop never blocks indefinitely.
/// Dropping the decoder between calls discards any half-read packet.
pub struct RadioDecoder<R> {
    source: ByteSource<R>,
    sync: FrameSynchronizer,
    registry: Arc<SchemaRegistry>,
    max_packet_len: usize,
    stats: DecoderStats,
    last_idle: Option<StreamStop>,
}

impl<R: Read> RadioDecoder<R> {
    pub fn new(reader: R, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            source: ByteSource::new(reader),
            sync: FrameSynchronizer::default(),
            registry,
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
            stats: DecoderStats::default(),
            last_idle: None,
        }
    }

    pub fn with_max_packet_len(mut self, max_packet_len: usize) -> Self {
        self.max_packet_len = max_packet_len;
        self
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats { noise_bytes: self.sync.noise_bytes(), ..self.stats }
    }

    /// Why the last call returned `Ok(None)`.
    pub fn last_idle(&self) -> Option<StreamStop> {
        self.last_idle
    }

    /// Whether the transport has ended for good.
    pub fn is_exhausted(&self) -> bool {
        self.last_idle == Some(StreamStop::EndOfStream)
    }

    pub fn get_ref(&self) -> &R {
        self.source.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    /// Decode the next packet.
    ///
    /// - `Ok(Some(_))`: a packet header was read; fields may be partial
    /// - `Ok(None)`: no packet this time, see [`last_idle`](Self::last_idle)
    /// - `Err(_)`: the transport failed
    pub fn decode_next(&mut self) -> Result<Option<DecodedPacket>> {
        self.last_idle = None;

        match self.sync.synchronize(&mut self.source)? {
            SyncOutcome::Found => {}
            SyncOutcome::NeedMoreInput => {
                self.last_idle = Some(StreamStop::Timeout);
                return Ok(None);
            }
            SyncOutcome::EndOfStream => {
                self.last_idle = Some(StreamStop::EndOfStream);
                return Ok(None);
            }
        }

        let mut header = [0u8; HEADER_LEN];
        if let Err(short) = self.source.read_exact(&mut header)? {
            debug!(available = short.available, cause = %short.stop, "Frame header cut short");
            self.stats.dropped_headers += 1;
            self.last_idle = Some(short.stop);
            return Ok(None);
        }

        let timestamp_ms = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let sequence_number = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let mut packet = Packet::new(timestamp_ms, sequence_number);
        let mut skipped = Vec::new();

        let termination = self.read_fields(&mut packet, &mut skipped)?;

        self.stats.packets += 1;
        self.stats.skipped_fields += skipped.len() as u64;
        match &termination {
            Termination::EndMarker => self.stats.complete_packets += 1,
            Termination::Truncated(reason) => {
                self.stats.truncated_packets += 1;
                debug!(sequence_number, fields = packet.fields.len(), %reason, "Packet truncated");
            }
            Termination::Oversized { limit } => {
                self.stats.oversized_packets += 1;
                warn!(sequence_number, limit, "Packet exceeded length limit, resynchronising");
            }
        }

        debug!(
            timestamp_ms,
            sequence_number,
            fields = packet.fields.len(),
            complete = termination.is_complete(),
            "Decoded radio packet"
        );

        Ok(Some(DecodedPacket { packet, termination, skipped }))
    }

    fn read_fields(&mut self, packet: &mut Packet, skipped: &mut Vec<DecodeError>) -> Result<Termination> {
        let mut body_len = 0usize;

        loop {
            let mut head = [0u8; 4];
            if let Err(short) = self.source.read_exact(&mut head)? {
                return Ok(Termination::Truncated(DecodeError::Truncated {
                    context: "field header",
                    needed: head.len(),
                    available: short.available,
                    cause: short.stop,
                }));
            }
            if head == RADIO_END_MARKER {
                return Ok(Termination::EndMarker);
            }

            let id = head[0];
            let definition = self.registry.lookup_by_id(id);
            // Unknown ids are assumed to carry a single-width payload.
            let kind = definition.map_or(FieldKind::Single, |d| d.kind);
            let payload_len = kind.radio_payload_len();

            body_len += 1 + payload_len;
            if body_len > self.max_packet_len {
                return Ok(Termination::Oversized { limit: self.max_packet_len });
            }

            let mut payload = [0u8; 12];
            payload[..3].copy_from_slice(&head[1..]);
            if let Err(short) = self.source.read_exact(&mut payload[3..payload_len])? {
                return Ok(Termination::Truncated(DecodeError::Truncated {
                    context: "field payload",
                    needed: payload_len,
                    available: 3 + short.available,
                    cause: short.stop,
                }));
            }

            if definition.is_none() {
                warn!(field_id = id, sequence_number = packet.sequence_number, "Skipping unknown field id");
                skipped.push(DecodeError::UnknownField { id });
                continue;
            }

            let field = match kind {
                FieldKind::Single => {
                    let bytes = [payload[0], payload[1], payload[2], payload[3]];
                    RawField {
                        id,
                        payload: RawPayload::Single(decode_single(bytes, self.registry.is_timestamp(id))),
                    }
                }
                FieldKind::Group => RawField::group(id, decode_group(&payload)),
            };
            trace!(field_id = id, payload = ?field.payload, "Decoded field");
            packet.fields.push(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamStop;
    use crate::test_utils::{RadioFrameBuilder, ScriptedReader, test_registry};
    use proptest::prelude::*;
    use std::io::Cursor;

    fn decoder(bytes: Vec<u8>) -> RadioDecoder<Cursor<Vec<u8>>> {
        RadioDecoder::new(Cursor::new(bytes), test_registry())
    }

    #[test]
    fn decodes_single_altitude_packet() {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x33];
        bytes.extend_from_slice(&1000u32.to_be_bytes());
        bytes.extend_from_slice(&42u32.to_be_bytes());
        bytes.push(8);
        bytes.extend_from_slice(&123.45f32.to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x34]);

        let mut decoder = decoder(bytes);
        let decoded = decoder.decode_next().unwrap().unwrap();

        assert!(decoded.is_complete());
        assert!(decoded.skipped.is_empty());
        assert_eq!(decoded.packet.timestamp_ms, 1000);
        assert_eq!(decoded.packet.sequence_number, 42);
        assert_eq!(decoded.packet.fields, vec![RawField::single(8, 123.45f32)]);

        assert!(decoder.decode_next().unwrap().is_none());
        assert!(decoder.is_exhausted());
    }

    #[test]
    fn group_bytes_are_swapped_per_float() {
        // Each chunk reversed then read little-endian.
        let chunk = 1.5f32.to_le_bytes();
        let reversed = [chunk[3], chunk[2], chunk[1], chunk[0]];
        let mut payload = [0u8; 12];
        for i in 0..3 {
            payload[i * 4..i * 4 + 4].copy_from_slice(&reversed);
        }
        assert_eq!(decode_group(&payload), [1.5, 1.5, 1.5]);
    }

    #[test]
    fn timestamp_field_in_body_is_unsigned() {
        assert_eq!(decode_single(5000u32.to_be_bytes(), true), Value::UInt(5000));
        assert_eq!(decode_single((-2.0f32).to_be_bytes(), false), Value::Float(-2.0));
    }

    #[test]
    fn unknown_field_is_skipped_and_decoding_continues() {
        let bytes = RadioFrameBuilder::new(10, 1)
            .raw_field(77, [1, 2, 3, 4])
            .single(8, 5.0)
            .build();

        let decoded = decoder(bytes).decode_next().unwrap().unwrap();
        assert!(decoded.is_complete());
        assert_eq!(decoded.skipped, vec![DecodeError::UnknownField { id: 77 }]);
        assert_eq!(decoded.packet.fields, vec![RawField::single(8, 5.0f32)]);
    }

    #[test]
    fn truncated_payload_keeps_earlier_fields() {
        let mut bytes = RadioFrameBuilder::new(10, 1).single(8, 1.0).single(7, 2.0).build_without_end();
        bytes.truncate(bytes.len() - 1);

        let decoded = decoder(bytes).decode_next().unwrap().unwrap();
        assert_eq!(decoded.packet.fields, vec![RawField::single(8, 1.0f32)]);
        assert_eq!(
            decoded.termination,
            Termination::Truncated(DecodeError::Truncated {
                context: "field payload",
                needed: 4,
                available: 3,
                cause: StreamStop::EndOfStream,
            })
        );
    }

    #[test]
    fn timeout_mid_packet_returns_partial_then_resyncs() {
        let first = RadioFrameBuilder::new(10, 1).single(8, 1.0).build_without_end();
        let second = RadioFrameBuilder::new(20, 2).single(8, 2.0).build();
        let reader = ScriptedReader::new().chunk(&first).timeout().chunk(&second);

        let mut decoder = RadioDecoder::new(reader, test_registry());
        let partial = decoder.decode_next().unwrap().unwrap();
        assert_eq!(partial.packet.fields.len(), 1);
        assert!(matches!(
            partial.termination,
            Termination::Truncated(DecodeError::Truncated { cause: StreamStop::Timeout, .. })
        ));

        let next = decoder.decode_next().unwrap().unwrap();
        assert_eq!(next.packet.sequence_number, 2);
        assert!(next.is_complete());
        assert_eq!(decoder.stats().truncated_packets, 1);
        assert_eq!(decoder.stats().complete_packets, 1);
    }

    #[test]
    fn short_header_yields_no_packet() {
        let mut bytes = vec![0, 0, 0, 0x33];
        bytes.extend_from_slice(&[0, 0, 1]);
        let mut decoder = decoder(bytes);
        assert!(decoder.decode_next().unwrap().is_none());
        assert_eq!(decoder.last_idle(), Some(StreamStop::EndOfStream));
        assert_eq!(decoder.stats().dropped_headers, 1);
    }

    #[test]
    fn idle_link_reports_timeout() {
        let reader = ScriptedReader::new().chunk(&[1, 2, 3]).timeout();
        let mut decoder = RadioDecoder::new(reader, test_registry());
        assert!(decoder.decode_next().unwrap().is_none());
        assert_eq!(decoder.last_idle(), Some(StreamStop::Timeout));
        assert!(!decoder.is_exhausted());
    }

    #[test]
    fn oversized_packet_stops_and_next_frame_decodes() {
        let mut builder = RadioFrameBuilder::new(1, 1);
        for _ in 0..10 {
            builder = builder.single(8, 0.5);
        }
        let mut bytes = builder.build();
        bytes.extend(RadioFrameBuilder::new(2, 2).single(8, 3.0).build());

        let mut decoder = decoder(bytes).with_max_packet_len(20);
        let first = decoder.decode_next().unwrap().unwrap();
        assert_eq!(first.termination, Termination::Oversized { limit: 20 });
        assert_eq!(first.packet.fields.len(), 4);

        let second = decoder.decode_next().unwrap().unwrap();
        assert_eq!(second.packet.sequence_number, 2);
        assert_eq!(decoder.stats().oversized_packets, 1);
    }

    #[test]
    fn noise_is_counted() {
        let mut bytes = vec![0xDE, 0xAD, 0xBE, 0xEF];
        bytes.extend(RadioFrameBuilder::new(1, 1).build());
        let mut decoder = decoder(bytes);
        decoder.decode_next().unwrap().unwrap();
        assert_eq!(decoder.stats().noise_bytes, 4);
    }

    proptest! {
        #[test]
        fn noise_prefix_does_not_change_result(
            noise in prop::collection::vec(any::<u8>(), 0..64),
            altitude in any::<f32>().prop_filter("finite", |v| v.is_finite()),
            timestamp in any::<u32>(),
            seq in any::<u32>(),
        ) {
            let frame = RadioFrameBuilder::new(timestamp, seq).single(8, altitude).build();
            let mut noisy = noise.clone();
            noisy.extend_from_slice(&frame);
            prop_assume!(!noise.windows(4).any(|w| w == [0, 0, 0, 0x33]));
            // A noise tail of zeros is indistinguishable from the marker prefix.
            prop_assume!(noisy.windows(4).position(|w| w == [0, 0, 0, 0x33]) == Some(noise.len()));

            let clean = decoder(frame).decode_next().unwrap().unwrap();
            let dirty = decoder(noisy).decode_next().unwrap().unwrap();
            prop_assert_eq!(clean.packet.fields, dirty.packet.fields);
            prop_assert_eq!(dirty.packet.timestamp_ms, timestamp);
            prop_assert_eq!(dirty.packet.sequence_number, seq);
        }

        #[test]
        fn group_values_decode_in_order(x in any::<f32>(), y in any::<f32>(), z in any::<f32>()) {
            prop_assume!(x.is_finite() && y.is_finite() && z.is_finite());
            let bytes = RadioFrameBuilder::new(0, 0).group(100, [x, y, z]).build();
            let decoded = decoder(bytes).decode_next().unwrap().unwrap();
            prop_assert!(decoded.is_complete());
            prop_assert_eq!(decoded.packet.fields, vec![RawField::group(100, [x, y, z])]);
        }
    }
}
