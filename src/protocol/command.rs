//! Board control commands
//!
//! Besides streaming telemetry, the flight computer answers a few request/response
//! commands on its USB serial console. Requests are framed as
//! `'<' code 0x00 '>'`; responses start with a status byte.
//!
//! | Command | Code | Response |
//! |---|---|---|
//! | ping | `0x01` | `'<' 0x01 status '>'` |
//! | versions | `0x02` | status, count, then per entry `len name len version` |
//! | flash dump | `0x03` | status, `u32` little-endian length, then the dump |

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::{Result, TelemetryError};

pub const RESP_OK: u8 = 0x00;
pub const RESP_ERROR: u8 = 0xFF;

/// Commands understood by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    Ping = 0x01,
    Versions = 0x02,
    FlashDump = 0x03,
}

impl CommandCode {
    pub fn name(self) -> &'static str {
        match self {
            CommandCode::Ping => "ping",
            CommandCode::Versions => "versions",
            CommandCode::FlashDump => "flash dump",
        }
    }

    /// Wire frame for this command.
    pub fn frame(self) -> [u8; 4] {
        [b'<', self as u8, 0x00, b'>']
    }
}

/// One component version reported by the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub component: String,
    pub version: String,
}

/// Status and payload length preceding a flash dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashDumpHeader {
    pub status: u8,
    pub length: u32,
}

pub const FLASH_DUMP_HEADER_LEN: usize = 5;

/// Capacity of the board's 16 MiB flash chip.
pub const DEFAULT_MAX_DUMP_LEN: usize = 16 * 1024 * 1024;

const READ_CHUNK_LEN: usize = 4096;

fn check_status(command: &'static str, status: u8) -> Result<()> {
    match status {
        RESP_OK => Ok(()),
        RESP_ERROR => Err(TelemetryError::command(command, "board reported an error")),
        other => Err(TelemetryError::command(command, format!("unexpected status byte 0x{:02x}", other))),
    }
}

/// Validate a ping response.
pub fn parse_ping_response(response: &[u8]) -> Result<()> {
    let command = CommandCode::Ping.name();
    if response.len() != 4 {
        return Err(TelemetryError::command(
            command,
            format!("expected 4 bytes, got {}", response.len()),
        ));
    }
    if response[0] != b'<' || response[3] != b'>' {
        return Err(TelemetryError::command(command, "response is not framed by '<' and '>'"));
    }
    if response[1] != CommandCode::Ping as u8 {
        return Err(TelemetryError::command(
            command,
            format!("response echoes command 0x{:02x}", response[1]),
        ));
    }
    check_status(command, response[2])
}

/// Parse a versions response.
pub fn parse_versions_response(response: &[u8]) -> Result<Vec<VersionInfo>> {
    let command = CommandCode::Versions.name();
    let (&status, rest) = response
        .split_first()
        .ok_or_else(|| TelemetryError::command(command, "empty response"))?;
    check_status(command, status)?;

    let (&count, mut rest) =
        rest.split_first().ok_or_else(|| TelemetryError::command(command, "missing version count"))?;

    let mut take_string = |what: &str| -> Result<String> {
        let (&len, tail) = rest
            .split_first()
            .ok_or_else(|| TelemetryError::command(command, format!("missing {} length", what)))?;
        let len = len as usize;
        if tail.len() < len {
            return Err(TelemetryError::command(
                command,
                format!("{} needs {} bytes, {} left", what, len, tail.len()),
            ));
        }
        let (text, tail) = tail.split_at(len);
        rest = tail;
        String::from_utf8(text.to_vec())
            .map_err(|e| TelemetryError::command(command, format!("{} is not UTF-8: {}", what, e)))
    };

    let mut versions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let component = take_string("component name")?;
        let version = take_string("version string")?;
        versions.push(VersionInfo { component, version });
    }
    Ok(versions)
}

/// Parse the 5-byte header of a flash dump response.
pub fn parse_flash_dump_header(response: &[u8]) -> Result<FlashDumpHeader> {
    let command = CommandCode::FlashDump.name();
    if response.len() < FLASH_DUMP_HEADER_LEN {
        return Err(TelemetryError::command(command, "response too short"));
    }
    check_status(command, response[0])?;
    let length = u32::from_le_bytes([response[1], response[2], response[3], response[4]]);
    Ok(FlashDumpHeader { status: response[0], length })
}

/// Parse a complete flash dump response, returning the dump bytes.
pub fn parse_flash_dump_response(response: &[u8]) -> Result<&[u8]> {
    let header = parse_flash_dump_header(response)?;
    let data = &response[FLASH_DUMP_HEADER_LEN..];
    let length = header.length as usize;
    if data.len() < length {
        return Err(TelemetryError::command(
            CommandCode::FlashDump.name(),
            format!("incomplete data: expected {} bytes, got {}", length, data.len()),
        ));
    }
    Ok(&data[..length])
}

/// Request/response client over the board's command port.
///
/// Blocking; wrap calls in `spawn_blocking` from async code.
pub struct BoardLink<T> {
    port: T,
    timeout: Duration,
    max_dump_len: usize,
}

impl<T: Read + Write> BoardLink<T> {
    pub fn new(port: T, timeout: Duration) -> Self {
        Self { port, timeout, max_dump_len: DEFAULT_MAX_DUMP_LEN }
    }

    /// Refuse flash dumps announcing more than `max_dump_len` bytes.
    pub fn with_max_dump_len(mut self, max_dump_len: usize) -> Self {
        self.max_dump_len = max_dump_len;
        self
    }

    pub fn into_inner(self) -> T {
        self.port
    }

    fn send(&mut self, code: CommandCode) -> Result<()> {
        trace!(command = code.name(), "Sending board command");
        self.port
            .write_all(&code.frame())
            .and_then(|_| self.port.flush())
            .map_err(|e| TelemetryError::io(format!("sending {} command", code.name()), e))
    }

    fn read_bytes(&mut self, command: &'static str, len: usize, started: Instant) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(READ_CHUNK_LEN));
        let mut chunk = [0u8; READ_CHUNK_LEN];
        while buf.len() < len {
            if started.elapsed() >= self.timeout {
                return Err(TelemetryError::Timeout { duration: self.timeout });
            }
            let want = (len - buf.len()).min(READ_CHUNK_LEN);
            match self.port.read(&mut chunk[..want]) {
                Ok(0) => {
                    return Err(TelemetryError::command(command, "connection closed mid-response"));
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) => return Err(TelemetryError::io(format!("reading {} response", command), e)),
            }
        }
        Ok(buf)
    }

    pub fn ping(&mut self) -> Result<()> {
        let code = CommandCode::Ping;
        self.send(code)?;
        let response = self.read_bytes(code.name(), 4, Instant::now())?;
        parse_ping_response(&response)
    }

    pub fn versions(&mut self) -> Result<Vec<VersionInfo>> {
        let code = CommandCode::Versions;
        let started = Instant::now();
        self.send(code)?;

        let mut response = self.read_bytes(code.name(), 2, started)?;
        check_status(code.name(), response[0])?;
        for _ in 0..response[1] {
            for _ in 0..2 {
                let len = self.read_bytes(code.name(), 1, started)?;
                let text = self.read_bytes(code.name(), len[0] as usize, started)?;
                response.extend_from_slice(&len);
                response.extend_from_slice(&text);
            }
        }

        let versions = parse_versions_response(&response)?;
        debug!(count = versions.len(), "Board versions received");
        Ok(versions)
    }

    /// Retrieve the raw flash dump bytes.
    pub fn flash_dump(&mut self) -> Result<Vec<u8>> {
        let code = CommandCode::FlashDump;
        let started = Instant::now();
        self.send(code)?;

        let header = self.read_bytes(code.name(), FLASH_DUMP_HEADER_LEN, started)?;
        let header = parse_flash_dump_header(&header)?;
        let length = header.length as usize;
        if length > self.max_dump_len {
            return Err(TelemetryError::command(
                code.name(),
                format!("announced {} bytes, limit is {}", length, self.max_dump_len),
            ));
        }
        debug!(bytes = length, "Receiving flash dump");
        self.read_bytes(code.name(), length, started)
    }
}
