//! Ground station configuration
//!
//! Loaded from YAML. Every key is optional and falls back to the values the
//! ground station ships with:
//!
//! ```yaml
//! schema:
//!   version: 3
//!   directory: ./protocols/data_names
//! radio:
//!   read_timeout_ms: 1000
//!   max_packet_len: 255
//!   baud_rate: 57600
//! flash:
//!   page_body_len: 256
//!   ack_marker: abc
//!   eof_marker: EOF
//!   stop_at_erased: false
//!   max_dump_len: 16777216
//! retention:
//!   window: 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::protocol::command::DEFAULT_MAX_DUMP_LEN;
use crate::protocol::flash::{DEFAULT_ACK_MARKER, DEFAULT_EOF_MARKER, DEFAULT_PAGE_BODY_LEN, FLASH_RECORD_LEN};
use crate::protocol::radio::DEFAULT_MAX_PACKET_LEN;
use crate::protocol::FlashLayout;
use crate::retention::DEFAULT_RETENTION_WINDOW;
use crate::schema::{DEFAULT_SCHEMA_VERSION, SchemaCatalog, SchemaRegistry};
use crate::{Result, TelemetryError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroundConfig {
    pub schema: SchemaConfig,
    pub radio: RadioConfig,
    pub flash: FlashConfig,
    pub retention: RetentionConfig,
}

/// Which field schema to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    pub version: u8,
    /// Directory of `data_names_vNN.yaml` files; bundled definitions when absent
    pub directory: Option<PathBuf>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self { version: DEFAULT_SCHEMA_VERSION, directory: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadioConfig {
    pub read_timeout_ms: u64,
    pub max_packet_len: usize,
    pub baud_rate: u32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self { read_timeout_ms: 1000, max_packet_len: DEFAULT_MAX_PACKET_LEN, baud_rate: 57_600 }
    }
}

impl RadioConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlashConfig {
    pub page_body_len: usize,
    pub ack_marker: String,
    pub eof_marker: String,
    pub stop_at_erased: bool,
    /// Largest dump the board may announce before it is refused
    pub max_dump_len: usize,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            page_body_len: DEFAULT_PAGE_BODY_LEN,
            ack_marker: String::from_utf8_lossy(&DEFAULT_ACK_MARKER).into_owned(),
            eof_marker: String::from_utf8_lossy(&DEFAULT_EOF_MARKER).into_owned(),
            stop_at_erased: false,
            max_dump_len: DEFAULT_MAX_DUMP_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    pub window: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { window: DEFAULT_RETENTION_WINDOW }
    }
}

fn marker(name: &str, value: &str) -> Result<[u8; 3]> {
    value
        .as_bytes()
        .try_into()
        .map_err(|_| TelemetryError::config(format!("{name} must be exactly 3 bytes, got {:?}", value)))
}

impl GroundConfig {
    /// Parse and validate.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| TelemetryError::config(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml =
            std::fs::read_to_string(path).map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        let config = Self::from_yaml_str(&yaml)?;
        debug!(path = %path.display(), schema_version = config.schema.version, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention.window == 0 {
            return Err(TelemetryError::config("retention.window must be at least 1"));
        }
        if self.radio.max_packet_len == 0 {
            return Err(TelemetryError::config("radio.max_packet_len must be at least 1"));
        }
        if self.radio.read_timeout_ms == 0 {
            return Err(TelemetryError::config("radio.read_timeout_ms must be at least 1"));
        }
        if self.flash.page_body_len < FLASH_RECORD_LEN {
            return Err(TelemetryError::config(format!(
                "flash.page_body_len must hold at least one {FLASH_RECORD_LEN}-byte record"
            )));
        }
        if self.flash.max_dump_len == 0 {
            return Err(TelemetryError::config("flash.max_dump_len must be at least 1"));
        }
        self.flash_layout()?.validate()
    }

    pub fn flash_layout(&self) -> Result<FlashLayout> {
        Ok(FlashLayout {
            page_body_len: self.flash.page_body_len,
            ack_marker: marker("flash.ack_marker", &self.flash.ack_marker)?,
            eof_marker: marker("flash.eof_marker", &self.flash.eof_marker)?,
            stop_at_erased: self.flash.stop_at_erased,
        })
    }

    pub fn catalog(&self) -> SchemaCatalog {
        match &self.schema.directory {
            Some(dir) => SchemaCatalog::from_dir(dir),
            None => SchemaCatalog::builtin(),
        }
    }

    /// Load the configured schema version.
    pub fn load_registry(&self) -> Result<Arc<SchemaRegistry>> {
        self.catalog().load(self.schema.version).map(Arc::new)
    }
}
