//! Buffered, timeout-aware byte reader
//!
//! Serial transports report "nothing arrived in time" as an I/O error of kind
//! `TimedOut` (or `WouldBlock` for non-blocking handles) and end of stream as a
//! zero-length read. [`ByteSource`] folds both into [`StreamStop`] so the decoders
//! can treat them as ordinary control flow instead of failures.

use std::io::{ErrorKind, Read};
use tracing::trace;

use crate::error::StreamStop;
use crate::{Result, TelemetryError};

const DEFAULT_CAPACITY: usize = 512;

/// A read that stopped before the requested length was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRead {
    /// Bytes copied into the destination before stopping
    pub available: usize,
    pub stop: StreamStop,
}

/// Owned read buffer over a transport.
///
/// Each decoder owns exactly one of these; buffered bytes are never shared
/// between sessions.
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
    consumed: u64,
}

impl<R: Read> ByteSource<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self { inner, buf: vec![0u8; capacity.max(1)].into_boxed_slice(), pos: 0, filled: 0, consumed: 0 }
    }

    /// Refill the buffer if empty. Returns `Some(stop)` when the transport produced nothing.
    fn fill(&mut self) -> Result<Option<StreamStop>> {
        if self.pos < self.filled {
            return Ok(None);
        }
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Ok(Some(StreamStop::EndOfStream)),
                Ok(n) => {
                    trace!(bytes = n, "Transport read");
                    self.pos = 0;
                    self.filled = n;
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(Some(StreamStop::Timeout));
                }
                Err(e) => return Err(TelemetryError::io("transport read", e)),
            }
        }
    }

    /// Next byte, or why none is available.
    pub fn next_byte(&mut self) -> Result<std::result::Result<u8, StreamStop>> {
        if let Some(stop) = self.fill()? {
            return Ok(Err(stop));
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        self.consumed += 1;
        Ok(Ok(byte))
    }

    /// Fill `out` completely, or report how far it got.
    ///
    /// Bytes read before a stop are left in `out[..available]` and are consumed.
    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<std::result::Result<(), ShortRead>> {
        let mut written = 0;
        while written < out.len() {
            if let Some(stop) = self.fill()? {
                return Ok(Err(ShortRead { available: written, stop }));
            }
            let n = (self.filled - self.pos).min(out.len() - written);
            out[written..written + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            self.consumed += n as u64;
            written += n;
        }
        Ok(Ok(()))
    }

    /// Bytes currently buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    /// Drop buffered bytes, e.g. after reconnecting the transport.
    pub fn discard_buffered(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }

    /// Total bytes handed out since construction.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedReader;
    use std::io::Cursor;

    #[test]
    fn zero_length_read_is_end_of_stream() {
        let mut source = ByteSource::new(Cursor::new(vec![7u8]));
        assert_eq!(source.next_byte().unwrap(), Ok(7));
        assert_eq!(source.next_byte().unwrap(), Err(StreamStop::EndOfStream));
        assert_eq!(source.consumed(), 1);
    }

    #[test]
    fn timeouts_are_not_errors() {
        let reader = ScriptedReader::new().chunk(&[1, 2]).timeout().chunk(&[3]);
        let mut source = ByteSource::new(reader);

        let mut out = [0u8; 3];
        let short = source.read_exact(&mut out).unwrap().unwrap_err();
        assert_eq!(short, ShortRead { available: 2, stop: StreamStop::Timeout });
        assert_eq!(&out[..2], &[1, 2]);

        // The transport recovers after the timeout.
        assert_eq!(source.next_byte().unwrap(), Ok(3));
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let reader = ScriptedReader::new().interrupted().chunk(&[9]);
        let mut source = ByteSource::new(reader);
        assert_eq!(source.next_byte().unwrap(), Ok(9));
    }

    #[test]
    fn other_io_errors_propagate() {
        let reader = ScriptedReader::new().error(ErrorKind::BrokenPipe);
        let mut source = ByteSource::new(reader);
        let err = source.next_byte().unwrap_err();
        assert!(matches!(err, TelemetryError::Io { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn reads_span_multiple_refills() {
        let data: Vec<u8> = (0..=255).collect();
        let mut source = ByteSource::with_capacity(16, Cursor::new(data.clone()));
        let mut out = vec![0u8; 256];
        source.read_exact(&mut out).unwrap().unwrap();
        assert_eq!(out, data);
        assert_eq!(source.buffered(), 0);
    }

    #[test]
    fn discard_drops_buffered_bytes() {
        let mut source = ByteSource::new(Cursor::new(vec![1u8, 2, 3]));
        assert_eq!(source.next_byte().unwrap(), Ok(1));
        assert_eq!(source.buffered(), 2);
        source.discard_buffered();
        assert_eq!(source.next_byte().unwrap(), Err(StreamStop::EndOfStream));
    }
}
