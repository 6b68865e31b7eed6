//! Flash dump decoding
//!
//! The flight computer logs every sensor reading to onboard flash as a 5-byte
//! record: one field id byte followed by four little-endian value bytes. The
//! timestamp field is an unsigned integer, everything else a float. A dump is
//! retrieved page by page, each page prefixed with a 3-byte header that is either
//! the acknowledgement marker or the end-of-dump sentinel.
//!
//! Records are grouped into rows: a timestamp record starts a new row, and the
//! row being built (if it has anything in it) is emitted first.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::error::DecodeError;
use crate::schema::SchemaRegistry;
use crate::types::{RawField, Value};
use crate::{Result, TelemetryError};

/// Length of one `(id, value)` record.
pub const FLASH_RECORD_LEN: usize = 5;

/// Length of the header preceding every page.
pub const PAGE_HEADER_LEN: usize = 3;

/// Field id of unwritten (erased) flash.
pub const ERASED_FIELD_ID: u8 = 0xFF;

pub const DEFAULT_ACK_MARKER: [u8; 3] = *b"abc";
pub const DEFAULT_EOF_MARKER: [u8; 3] = *b"EOF";
pub const DEFAULT_PAGE_BODY_LEN: usize = 256;

/// Page framing of a flash dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashLayout {
    /// Bytes following each page header
    pub page_body_len: usize,
    pub ack_marker: [u8; 3],
    pub eof_marker: [u8; 3],
    /// End the dump at the first erased record instead of skipping to the next page
    pub stop_at_erased: bool,
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self {
            page_body_len: DEFAULT_PAGE_BODY_LEN,
            ack_marker: DEFAULT_ACK_MARKER,
            eof_marker: DEFAULT_EOF_MARKER,
            stop_at_erased: false,
        }
    }
}

impl FlashLayout {
    /// Header plus body.
    pub fn page_len(&self) -> usize {
        PAGE_HEADER_LEN + self.page_body_len
    }

    /// Complete records per page. Trailing bytes are padding.
    pub fn records_per_page(&self) -> usize {
        self.page_body_len / FLASH_RECORD_LEN
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_body_len < FLASH_RECORD_LEN {
            return Err(TelemetryError::config(format!(
                "Flash page body of {} bytes cannot hold a {}-byte record",
                self.page_body_len, FLASH_RECORD_LEN
            )));
        }
        if self.ack_marker == self.eof_marker {
            return Err(TelemetryError::config("Flash ack and EOF markers must differ"));
        }
        Ok(())
    }
}

/// What happened while decoding a dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashDumpStats {
    /// Pages with a valid ack header
    pub pages: usize,
    pub corrupt_pages: usize,
    pub skipped_fields: usize,
    pub erased_pages: usize,
    pub reached_eof: bool,
    /// The input ended partway through a page
    pub truncated_tail: bool,
}

/// Decoded rows of a dump, in flash order.
#[derive(Debug, Clone, Default)]
pub struct FlashDump {
    pub rows: Vec<Vec<RawField>>,
    pub stats: FlashDumpStats,
    /// Per-record and per-page problems that were skipped
    pub skipped: Vec<DecodeError>,
}

impl FlashDump {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

enum RecordOutcome {
    Continue,
    Erased,
}

/// Accumulates records into timestamp-delimited rows.
#[derive(Debug, Default)]
struct RowSplitter {
    building: Vec<RawField>,
    rows: Vec<Vec<RawField>>,
}

impl RowSplitter {
    fn push(&mut self, field: RawField, starts_row: bool) {
        if starts_row && !self.building.is_empty() {
            self.rows.push(std::mem::take(&mut self.building));
        }
        self.building.push(field);
    }

    fn finish(mut self) -> Vec<Vec<RawField>> {
        if !self.building.is_empty() {
            self.rows.push(self.building);
        }
        self.rows
    }
}

/// Decodes captured flash dumps against a schema.
#[derive(Debug, Clone)]
pub struct FlashDumpDecoder {
    registry: Arc<SchemaRegistry>,
    layout: FlashLayout,
}

impl FlashDumpDecoder {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry, layout: FlashLayout::default() }
    }

    pub fn with_layout(registry: Arc<SchemaRegistry>, layout: FlashLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self { registry, layout })
    }

    pub fn layout(&self) -> &FlashLayout {
        &self.layout
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Decode a paged dump.
    pub fn decode(&self, data: &[u8]) -> FlashDump {
        let mut splitter = RowSplitter::default();
        let mut stats = FlashDumpStats::default();
        let mut skipped = Vec::new();

        'pages: for (page_index, page) in data.chunks(self.layout.page_len()).enumerate() {
            if page.len() < PAGE_HEADER_LEN {
                debug!(page = page_index, bytes = page.len(), "Dump ends inside a page header");
                stats.truncated_tail = true;
                break;
            }

            let header = [page[0], page[1], page[2]];
            if header == self.layout.eof_marker {
                debug!(page = page_index, "Reached EOF sentinel");
                stats.reached_eof = true;
                break;
            }
            if header != self.layout.ack_marker {
                warn!(page = page_index, header = ?header, "Skipping corrupt flash page");
                stats.corrupt_pages += 1;
                skipped.push(DecodeError::CorruptPage { page: page_index, header });
                continue;
            }

            stats.pages += 1;
            let body = &page[PAGE_HEADER_LEN..];
            if body.len() < self.layout.page_body_len {
                debug!(page = page_index, bytes = body.len(), "Final flash page is short");
                stats.truncated_tail = true;
            }

            for record in body.chunks_exact(FLASH_RECORD_LEN) {
                let outcome = self.decode_record(record, &mut splitter, &mut skipped);
                if let RecordOutcome::Erased = outcome {
                    stats.erased_pages += 1;
                    if self.layout.stop_at_erased {
                        debug!(page = page_index, "Erased flash reached, ending dump");
                        break 'pages;
                    }
                    continue 'pages;
                }
            }
        }

        stats.skipped_fields =
            skipped.iter().filter(|e| matches!(e, DecodeError::UnknownField { .. })).count();
        let rows = splitter.finish();

        info!(
            rows = rows.len(),
            pages = stats.pages,
            corrupt_pages = stats.corrupt_pages,
            skipped_fields = stats.skipped_fields,
            reached_eof = stats.reached_eof,
            "Decoded flash dump"
        );

        FlashDump { rows, stats, skipped }
    }

    /// Decode a flat run of records with no page framing, as streamed by the
    /// board's `dump` console command after its alignment marker. Stops at the
    /// first erased record.
    pub fn decode_unpaged(&self, data: &[u8]) -> FlashDump {
        let mut splitter = RowSplitter::default();
        let mut stats = FlashDumpStats::default();
        let mut skipped = Vec::new();

        let mut records = data.chunks_exact(FLASH_RECORD_LEN);
        for record in records.by_ref() {
            if let RecordOutcome::Erased = self.decode_record(record, &mut splitter, &mut skipped) {
                stats.reached_eof = true;
                break;
            }
        }
        stats.truncated_tail = !stats.reached_eof && !records.remainder().is_empty();
        stats.skipped_fields = skipped.len();

        FlashDump { rows: splitter.finish(), stats, skipped }
    }

    /// Read and decode a saved paged dump.
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> Result<FlashDump> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), bytes = data.len(), "Read flash dump file");
        Ok(self.decode(&data))
    }

    fn decode_record(
        &self,
        record: &[u8],
        splitter: &mut RowSplitter,
        skipped: &mut Vec<DecodeError>,
    ) -> RecordOutcome {
        let id = record[0];
        if id == ERASED_FIELD_ID {
            return RecordOutcome::Erased;
        }

        let bytes = [record[1], record[2], record[3], record[4]];
        match self.registry.lookup_by_id(id) {
            Some(def) if !def.is_group() => {
                let is_timestamp = self.registry.is_timestamp(id);
                let value = if is_timestamp {
                    Value::UInt(u32::from_le_bytes(bytes))
                } else {
                    Value::Float(f32::from_le_bytes(bytes))
                };
                trace!(field_id = id, %value, "Flash record");
                splitter.push(RawField::single(id, value), is_timestamp);
            }
            Some(_) => {
                warn!(field_id = id, "Group id cannot appear in a flash record, skipping");
                skipped.push(DecodeError::UnknownField { id });
            }
            None => {
                warn!(field_id = id, "Skipping unknown flash field id");
                skipped.push(DecodeError::UnknownField { id });
            }
        }
        RecordOutcome::Continue
    }
}
