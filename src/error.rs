//! Error types for telemetry decoding.
//!
//! Two layers of errors exist in this crate:
//!
//! - [`TelemetryError`] is the crate-wide error for operations that can genuinely fail:
//!   loading a schema, opening a dump file, a transport that went away, a malformed
//!   command response. Schema and configuration errors are fatal preconditions and
//!   must stop a session before any decoding starts.
//! - [`DecodeError`] describes the expected, non-fatal problems met while decoding a
//!   lossy stream (unknown field ids, truncated payloads, oversized packets). These are
//!   never returned as `Err`; they travel inside decode results so callers and tests can
//!   see exactly which recovery path was taken.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use martha_ground::TelemetryError;
//!
//! let error = TelemetryError::io("radio read", std::io::Error::other("port unplugged"));
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Schema error: {reason}")]
    Schema { reason: String, version: Option<u8> },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error during {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Field '{field}' not found in schema")]
    FieldNotFound { field: String },

    #[error("Command '{command}' failed: {details}")]
    Command { command: &'static str, details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Io { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Command { .. } => true,
            TelemetryError::Schema { .. } => false,
            TelemetryError::File { .. } => false,
            TelemetryError::FieldNotFound { .. } => false,
            TelemetryError::Config { .. } => false,
        }
    }

    /// Whether this error is a startup precondition failure that must prevent a
    /// session from starting.
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(self, TelemetryError::Schema { .. } | TelemetryError::Config { .. })
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Schema { .. } => vec![
                "Check the data names YAML for duplicate ids or names",
                "Verify every group lists exactly three single-valued children",
                "Select the protocol version matching the flight firmware",
            ],
            TelemetryError::File { .. } => vec![
                "Check file exists and is readable",
                "Verify the path points at a flash dump or schema file",
                "Check file permissions",
            ],
            TelemetryError::Io { .. } => vec![
                "Check the radio or USB cable is connected",
                "Reopen the serial port",
                "Verify no other program holds the port",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Verify the flight computer is powered and transmitting",
            ],
            TelemetryError::FieldNotFound { .. } => vec![
                "Check field name spelling",
                "Verify the field exists in the selected protocol version",
            ],
            TelemetryError::Command { .. } => vec![
                "Retry the command",
                "Power-cycle the board if it keeps answering with an error status",
            ],
            TelemetryError::Config { .. } => vec![
                "Fix the configuration file",
                "Remove the offending key to fall back to its default",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for transport errors.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Io { context: context.into(), source }
    }

    /// Helper constructor for schema errors.
    pub fn schema(reason: impl Into<String>, version: Option<u8>) -> Self {
        TelemetryError::Schema { reason: reason.into(), version }
    }

    /// Helper constructor for command response errors.
    pub fn command(command: &'static str, details: impl Into<String>) -> Self {
        TelemetryError::Command { command, details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        TelemetryError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Io { context: "<unknown>".to_string(), source: err }
    }
}

/// Why a byte source stopped producing bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStop {
    /// No byte arrived within the transport's read timeout.
    Timeout,
    /// The transport reported permanent end of stream.
    EndOfStream,
}

impl std::fmt::Display for StreamStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamStop::Timeout => f.write_str("read timeout"),
            StreamStop::EndOfStream => f.write_str("end of stream"),
        }
    }
}

/// Non-fatal decode problems, reported alongside partial results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The field id is not present in the active schema.
    #[error("unknown field id {id}")]
    UnknownField { id: u8 },

    /// The stream stopped before `needed` bytes were available.
    #[error("truncated {context}: needed {needed} bytes, got {available} ({cause})")]
    Truncated { context: &'static str, needed: usize, available: usize, cause: StreamStop },

    /// The packet body ran past the configured maximum without an end marker.
    #[error("packet body exceeded {limit} bytes without an end marker")]
    Oversized { limit: usize },

    /// A flash page header was neither the ack marker nor the EOF sentinel.
    #[error("corrupt flash page {page} with header {header:02x?}")]
    CorruptPage { page: usize, header: [u8; 3] },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in ".*",
            field_name in "\\w+",
            version in 0u8..100u8,
            details in ".*"
        ) {
            let schema_error = TelemetryError::schema(reason.clone(), Some(version));
            let field_error = TelemetryError::FieldNotFound { field: field_name.clone() };
            let command_error = TelemetryError::command("ping", details.clone());

            let schema_msg = schema_error.to_string();
            prop_assert!(schema_msg.contains(&reason));
            let schema_version_matches = matches!(schema_error, TelemetryError::Schema { version: Some(v), .. } if v == version);
            prop_assert!(schema_version_matches);
            prop_assert!(field_error.to_string().contains(&field_name));
            prop_assert!(command_error.to_string().contains(&details));
        }

        #[test]
        fn io_errors_convert_and_keep_their_source(reason in ".*") {
            let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, reason.clone());
            let converted: TelemetryError = io_err.into();
            match converted {
                TelemetryError::Io { source, .. } => {
                    prop_assert_eq!(source.to_string(), reason);
                }
                _ => prop_assert!(false, "Expected Io error from io::Error conversion"),
            }
        }
    }

    #[test]
    fn configuration_errors_are_fatal_and_not_retryable() {
        let schema = TelemetryError::schema("duplicate id 3", Some(3));
        let config = TelemetryError::config("retention window must be positive");

        assert!(schema.is_fatal_configuration());
        assert!(config.is_fatal_configuration());
        assert!(!schema.is_retryable());
        assert!(!config.is_retryable());
    }

    #[test]
    fn transport_errors_are_retryable() {
        let io = TelemetryError::io("radio read", std::io::Error::other("gone"));
        let timeout = TelemetryError::Timeout { duration: Duration::from_secs(1) };

        assert!(io.is_retryable());
        assert!(timeout.is_retryable());
        assert!(!io.is_fatal_configuration());
    }

    #[test]
    fn every_variant_has_recovery_suggestions() {
        let errors = vec![
            TelemetryError::schema("x", None),
            TelemetryError::file_error(PathBuf::from("/dump.bin"), std::io::Error::other("x")),
            TelemetryError::io("x", std::io::Error::other("x")),
            TelemetryError::Timeout { duration: Duration::from_millis(5) },
            TelemetryError::FieldNotFound { field: "ALTITUDE".into() },
            TelemetryError::command("versions", "status 0xff"),
            TelemetryError::config("x"),
        ];

        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "{error} has no suggestions");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn schema_error_message() {
        let error = TelemetryError::schema("missing TIMESTAMP", None);
        assert_eq!(error.to_string(), "Schema error: missing TIMESTAMP");
    }

    #[test]
    fn decode_errors_display_cause() {
        let error = DecodeError::Truncated {
            context: "field payload",
            needed: 12,
            available: 7,
            cause: StreamStop::Timeout,
        };
        let msg = error.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("read timeout"));

        let error = DecodeError::CorruptPage { page: 4, header: [0x61, 0x62, 0x00] };
        assert!(error.to_string().contains("page 4"));
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TelemetryError>();
        assert_send_sync_static::<DecodeError>();
    }
}
