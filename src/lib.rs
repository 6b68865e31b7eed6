//! Ground station telemetry decoding for the MARTHA flight computer.
//!
//! Turns raw bytes from the radio downlink or a flash dump into named,
//! timestamped records, and estimates radio link quality as it goes.
//!
//! # Features
//!
//! - **Radio decoding**: resynchronising frame decoder that tolerates noise,
//!   truncated packets and unknown field ids
//! - **Flash dumps**: paged dump decoding with erased-flash and corrupt-page handling
//! - **Versioned schemas**: field definitions loaded from YAML, bundled or on disk
//! - **Link quality**: rolling packet retention from transmitter sequence numbers
//! - **Async delivery**: subscribe to records at a chosen rate over Tokio
//!
//! ## Example (synchronous radio decoding)
//!
//! ```rust
//! use martha_ground::{RadioSession, SchemaRegistry};
//! use std::io::Cursor;
//! use std::sync::Arc;
//!
//! # fn main() -> martha_ground::Result<()> {
//! let registry = Arc::new(SchemaRegistry::builtin(3)?);
//! let bytes: Vec<u8> = vec![
//!     0, 0, 0, 0x33, // start marker
//!     0, 0, 0x03, 0xE8, // timestamp 1000 ms
//!     0, 0, 0, 1, // sequence number
//!     8, 0x42, 0xF6, 0xE6, 0x66, // ALTITUDE = 123.45
//!     0, 0, 0, 0x34, // end marker
//! ];
//!
//! let mut session = RadioSession::new(Cursor::new(bytes), registry);
//! let update = session.poll()?.expect("one packet");
//! assert_eq!(update.record.timestamp_ms, Some(1000));
//! assert_eq!(update.record.get_f64("ALTITUDE").map(|v| v as f32), Some(123.45));
//! # Ok(())
//! # }
//! ```
//!
//! ## Example (flash dump playback)
//!
//! ```rust,no_run
//! use martha_ground::{Ground, GroundConfig, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> martha_ground::Result<()> {
//!     let config = GroundConfig::load("ground.yaml")?;
//!     let connection = Ground::open_dump("flight.bin", &config).await?;
//!     let mut records = connection.subscribe(UpdateRate::Max(10));
//!
//!     while let Some(record) = records.next().await {
//!         println!("{:?} {:?}", record.timestamp_ms, record.get_f64("ALTITUDE"));
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Synchronous decoding core
pub mod analysis;
pub mod assembler;
pub mod protocol;
pub mod retention;
pub mod schema;
pub mod session;

// Stream-based delivery
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;

// Ambient
pub mod config;
pub mod logging;
#[cfg(feature = "serial")]
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

pub use assembler::{LatestValues, RecordAssembler};
pub use config::GroundConfig;
pub use connection::Connection;
pub use driver::SourceState;
pub use protocol::{FlashDump, FlashDumpDecoder, FlashLayout, FrameSynchronizer, RadioDecoder};
pub use retention::RetentionTracker;
pub use schema::{SchemaCatalog, SchemaRegistry, StateTable};
pub use session::{RadioSession, SessionUpdate};

/// Entry point for opening record sources.
///
/// ```rust,no_run
/// use martha_ground::{Ground, GroundConfig};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> martha_ground::Result<()> {
///     let connection = Ground::open_dump("flight.bin", &GroundConfig::default()).await?;
///     println!("state: {:?}", connection.state());
///     Ok(())
/// }
/// ```
pub struct Ground;

impl Ground {
    /// Decode a radio link over any blocking transport.
    pub async fn radio<R>(reader: R, config: &GroundConfig) -> Result<Connection>
    where
        R: std::io::Read + Send + 'static,
    {
        Connection::open_radio(reader, config).await
    }

    /// Open a serial radio by port name, e.g. `/dev/ttyUSB0` or `COM3`.
    #[cfg(feature = "serial")]
    pub async fn serial(port_name: &str, config: &GroundConfig) -> Result<Connection> {
        Connection::open_serial(port_name, config).await
    }

    /// Play back a saved flash dump.
    pub async fn open_dump<P: AsRef<std::path::Path>>(path: P, config: &GroundConfig) -> Result<Connection> {
        Connection::open_dump(path, config).await
    }
}
