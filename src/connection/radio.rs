//! Live radio connections

use std::io::Read;
use tracing::info;

use super::Connection;
use crate::Result;
use crate::config::GroundConfig;
use crate::providers::RadioProvider;
use crate::session::RadioSession;

impl Connection {
    /// Decode a radio link over any blocking transport.
    ///
    /// The transport should bound its reads with a timeout so cancellation is
    /// observed promptly; a serial port opened through this crate does.
    pub async fn open_radio<R>(reader: R, config: &GroundConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        config.validate()?;
        let registry = config.load_registry()?;
        let session = RadioSession::new(reader, registry.clone())
            .with_retention_window(config.retention.window)
            .with_max_packet_len(config.radio.max_packet_len);
        let provider = RadioProvider::new(session);

        let connection = Self::from_provider(provider, registry);
        info!(source_hz = connection.source_hz(), "Radio connection opened");
        Ok(connection)
    }

    /// Open a serial radio and decode it.
    #[cfg(feature = "serial")]
    pub async fn open_serial(port_name: &str, config: &GroundConfig) -> Result<Self> {
        let port = crate::transport::open_radio(port_name, &config.radio)?;
        Self::open_radio(port, config).await
    }
}
