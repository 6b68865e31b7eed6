//! Log output setup for binaries and tools built on this crate

use tracing_subscriber::EnvFilter;

use crate::{Result, TelemetryError};

/// Install a `fmt` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `default_filter`
/// (for example `"martha_ground=info"`). Fails if a global subscriber is already
/// installed; callers that may initialise twice can ignore the error.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| TelemetryError::config(format!("invalid log filter {default_filter:?}: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| TelemetryError::config(format!("logging already initialised: {e}")))
}
