//! Naming decoded fields
//!
//! The assembler is the last synchronous step: it turns id-keyed [`RawField`]s into
//! a [`NamedRecord`] keyed by schema names. Group payloads expand into one entry per
//! child, in the group's declared order. Unknown ids are dropped with a log line.
//! No filtering, smoothing or unit conversion happens here.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::protocol::FlashDump;
use crate::schema::SchemaRegistry;
use crate::types::{NamedRecord, Packet, RawField, RawPayload, Value};

/// Maps raw fields to named records using one schema.
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    registry: Arc<SchemaRegistry>,
}

impl RecordAssembler {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Name every field into `record`. Returns the number of fields dropped.
    pub fn assemble_into(&self, record: &mut NamedRecord, fields: &[RawField]) -> usize {
        let mut dropped = 0;
        for field in fields {
            let Some(def) = self.registry.lookup_by_id(field.id) else {
                debug!(field_id = field.id, "Dropping field with unknown id");
                dropped += 1;
                continue;
            };

            match field.payload {
                RawPayload::Single(value) => {
                    record.insert(def.name.clone(), value);
                }
                RawPayload::Group(components) => {
                    let mut expanded = 0;
                    for (child, component) in self.registry.children_of(def).zip(components) {
                        record.insert(child.name.clone(), component);
                        expanded += 1;
                    }
                    trace!(group = %def.name, expanded, "Expanded group field");
                }
            }
        }
        dropped
    }

    /// Name a radio packet. The header timestamp becomes the record timestamp.
    pub fn assemble_packet(&self, packet: &Packet) -> NamedRecord {
        let mut record = NamedRecord::new(Some(packet.timestamp_ms));
        self.assemble_into(&mut record, &packet.fields);
        record
    }

    /// Name one flash row. Its timestamp field, when present, is kept as a value
    /// and also becomes the record timestamp.
    pub fn assemble_row(&self, row: &[RawField]) -> NamedRecord {
        let timestamp_ms = row
            .iter()
            .find(|f| self.registry.is_timestamp(f.id))
            .and_then(|f| f.value())
            .and_then(|v| v.as_u32());
        let mut record = NamedRecord::new(timestamp_ms);
        self.assemble_into(&mut record, row);
        record
    }

    /// Name every row of a flash dump, in order.
    pub fn assemble_dump(&self, dump: &FlashDump) -> Vec<NamedRecord> {
        dump.rows.iter().map(|row| self.assemble_row(row)).collect()
    }
}

/// Most recent value of every field seen on a link.
///
/// Records from a lossy link rarely carry every field; dashboards show the
/// latest known value per field instead of blanking missing ones.
#[derive(Debug, Clone, Default)]
pub struct LatestValues {
    values: BTreeMap<String, Value>,
    timestamp_ms: Option<u32>,
    sequence_number: Option<u32>,
    received_at: Option<Instant>,
    updates: u64,
}

impl LatestValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite with every value in `record`.
    pub fn merge(&mut self, record: &NamedRecord, sequence_number: Option<u32>, received_at: Instant) {
        for (name, value) in record.iter() {
            match self.values.get_mut(name) {
                Some(slot) => *slot = value,
                None => {
                    self.values.insert(name.to_string(), value);
                }
            }
        }
        if record.timestamp_ms.is_some() {
            self.timestamp_ms = record.timestamp_ms;
        }
        if sequence_number.is_some() {
            self.sequence_number = sequence_number;
        }
        self.received_at = Some(received_at);
        self.updates += 1;
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.as_f64())
    }

    /// Flight computer clock of the newest record, in seconds.
    pub fn timestamp_secs(&self) -> Option<f64> {
        self.timestamp_ms.map(|ms| ms as f64 / 1000.0)
    }

    pub fn timestamp_ms(&self) -> Option<u32> {
        self.timestamp_ms
    }

    pub fn sequence_number(&self) -> Option<u32> {
        self.sequence_number
    }

    /// When the newest record was received on the ground.
    pub fn received_at(&self) -> Option<Instant> {
        self.received_at
    }

    /// Number of records merged so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Current values as a record.
    pub fn snapshot(&self) -> NamedRecord {
        NamedRecord { timestamp_ms: self.timestamp_ms, values: self.values.clone() }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
