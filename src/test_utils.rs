//! Test utilities for building wire-format fixtures
//!
//! Encoders here produce radio frames and flash pages byte-for-byte the way the
//! flight firmware does, plus scripted transports that simulate read timeouts.
//! Compiled for tests and for the `benchmark` feature.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;

use crate::protocol::flash::{ERASED_FIELD_ID, FLASH_RECORD_LEN, FlashLayout};
use crate::protocol::sync::{RADIO_END_MARKER, RADIO_START_MARKER};
use crate::schema::{DEFAULT_SCHEMA_VERSION, SchemaRegistry};

/// The bundled current schema, shared.
pub fn test_registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::builtin(DEFAULT_SCHEMA_VERSION).expect("bundled schema must load"))
}

/// Encodes one radio frame.
#[derive(Debug, Clone)]
pub struct RadioFrameBuilder {
    bytes: Vec<u8>,
}

impl RadioFrameBuilder {
    pub fn new(timestamp_ms: u32, sequence_number: u32) -> Self {
        let mut bytes = RADIO_START_MARKER.to_vec();
        bytes.extend_from_slice(&timestamp_ms.to_be_bytes());
        bytes.extend_from_slice(&sequence_number.to_be_bytes());
        Self { bytes }
    }

    /// Single float field, big-endian.
    pub fn single(mut self, id: u8, value: f32) -> Self {
        self.bytes.push(id);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Timestamp-typed field, big-endian unsigned.
    pub fn uint(mut self, id: u8, value: u32) -> Self {
        self.bytes.push(id);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Group field: each float's little-endian bytes, reversed.
    pub fn group(mut self, id: u8, values: [f32; 3]) -> Self {
        self.bytes.push(id);
        for value in values {
            let mut chunk = value.to_le_bytes();
            chunk.reverse();
            self.bytes.extend_from_slice(&chunk);
        }
        self
    }

    /// Arbitrary id with a 4-byte payload.
    pub fn raw_field(mut self, id: u8, payload: [u8; 4]) -> Self {
        self.bytes.push(id);
        self.bytes.extend_from_slice(&payload);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.bytes.extend_from_slice(&RADIO_END_MARKER);
        self.bytes
    }

    /// Frame with the end marker missing, as left by a dropped link.
    pub fn build_without_end(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encodes records into ack-headed flash pages.
///
/// Unused record slots and padding in the last page are filled with erased
/// (`0xFF`) bytes, like unwritten flash.
#[derive(Debug, Clone)]
pub struct FlashPageBuilder {
    layout: FlashLayout,
    records: Vec<[u8; FLASH_RECORD_LEN]>,
    eof: bool,
}

impl FlashPageBuilder {
    pub fn new(layout: FlashLayout) -> Self {
        Self { layout, records: Vec::new(), eof: false }
    }

    pub fn raw(mut self, id: u8, value: [u8; 4]) -> Self {
        self.records.push([id, value[0], value[1], value[2], value[3]]);
        self
    }

    pub fn float(self, id: u8, value: f32) -> Self {
        self.raw(id, value.to_le_bytes())
    }

    pub fn timestamp(self, id: u8, value: u32) -> Self {
        self.raw(id, value.to_le_bytes())
    }

    /// Terminate with an EOF page.
    pub fn eof(mut self) -> Self {
        self.eof = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let per_page = self.layout.records_per_page().max(1);
        let mut out = Vec::new();

        for page in self.records.chunks(per_page) {
            out.extend_from_slice(&self.layout.ack_marker);
            let start = out.len();
            for record in page {
                out.extend_from_slice(record);
            }
            let used = out.len() - start;
            out.extend(std::iter::repeat_n(ERASED_FIELD_ID, self.layout.page_body_len - used));
        }

        if self.eof {
            out.extend_from_slice(&self.layout.eof_marker);
            out.extend(std::iter::repeat_n(ERASED_FIELD_ID, self.layout.page_body_len));
        }
        out
    }
}

#[derive(Debug)]
enum Step {
    Data(Vec<u8>),
    Fail(ErrorKind),
}

/// A transport that replays a script of data chunks and I/O errors, then ends.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    steps: VecDeque<Step>,
}

impl ScriptedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(mut self, bytes: &[u8]) -> Self {
        self.steps.push_back(Step::Data(bytes.to_vec()));
        self
    }

    /// One read fails with `TimedOut`, like a serial port read timeout.
    pub fn timeout(self) -> Self {
        self.error(ErrorKind::TimedOut)
    }

    pub fn interrupted(self) -> Self {
        self.error(ErrorKind::Interrupted)
    }

    pub fn error(mut self, kind: ErrorKind) -> Self {
        self.steps.push_back(Step::Fail(kind));
        self
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            None => Ok(0),
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    data.drain(..n);
                    self.steps.push_front(Step::Data(data));
                }
                Ok(n)
            }
        }
    }
}

/// In-memory command port: reads come from a canned reply, writes are captured.
#[derive(Debug, Default)]
pub struct MockPort {
    reply: io::Cursor<Vec<u8>>,
    written: Vec<u8>,
}

impl MockPort {
    pub fn new(reply: Vec<u8>) -> Self {
        Self { reply: io::Cursor::new(reply), written: Vec::new() }
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reply.read(buf)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
