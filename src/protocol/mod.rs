//! Wire protocols spoken by the flight computer
//!
//! - [`sync`] and [`radio`]: live telemetry frames from the radio link
//! - [`flash`]: paged dumps of the onboard flash log
//! - [`command`]: request/response board commands (ping, versions, flash dump)
//!
//! Everything here is synchronous and owns its buffers per instance. Async
//! delivery lives in [`crate::providers`].

pub mod byte_source;
pub mod command;
pub mod flash;
pub mod radio;
pub mod sync;

pub use byte_source::{ByteSource, ShortRead};
pub use command::{BoardLink, CommandCode, FlashDumpHeader, VersionInfo};
pub use flash::{FlashDump, FlashDumpDecoder, FlashDumpStats, FlashLayout};
pub use radio::{DecodedPacket, DecoderStats, RadioDecoder, Termination};
pub use sync::{FrameSynchronizer, RADIO_END_MARKER, RADIO_START_MARKER, SyncOutcome};
