//! Playback connections for saved flash dumps

use std::path::Path;
use tracing::info;

use super::{Connection, FIRST_RECORD_TIMEOUT};
use crate::Result;
use crate::config::GroundConfig;
use crate::providers::DumpProvider;
use crate::providers::dump::DEFAULT_PLAYBACK_HZ;

impl Connection {
    /// Play back a saved flash dump at the default rate.
    ///
    /// Waits for the first record before returning so subscribers start with data.
    pub async fn open_dump<P: AsRef<Path>>(path: P, config: &GroundConfig) -> Result<Self> {
        Self::open_dump_at(path, config, DEFAULT_PLAYBACK_HZ).await
    }

    /// Play back a saved flash dump at `rate_hz` rows per second.
    pub async fn open_dump_at<P: AsRef<Path>>(path: P, config: &GroundConfig, rate_hz: f64) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), rate_hz, "Opening flash dump");

        config.validate()?;
        let registry = config.load_registry()?;
        let provider =
            DumpProvider::from_file(path, registry.clone(), config.flash_layout()?)?.with_playback_rate(rate_hz);
        let rows = provider.total();

        let connection = Self::from_provider(provider, registry);
        connection.wait_for_first_record(FIRST_RECORD_TIMEOUT).await;

        info!(rows, "Dump connection opened");
        Ok(connection)
    }
}
