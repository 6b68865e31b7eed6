//! Radio provider over a blocking transport

use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::provider::{Provider, TelemetryUpdate};
use crate::schema::SchemaRegistry;
use crate::session::RadioSession;
use crate::{Result, TelemetryError};

/// Nominal rate of the flight computer's radio downlink.
pub const DEFAULT_RADIO_RATE_HZ: f64 = 10.0;

/// Provider that decodes packets from a radio link.
///
/// Transport reads block, so every poll runs on Tokio's blocking pool. The
/// session travels into the blocking task and back.
pub struct RadioProvider<R> {
    session: Option<RadioSession<R>>,
    registry: Arc<SchemaRegistry>,
    rate_hz: f64,
    idle_polls: u64,
}

impl<R: Read + Send + 'static> RadioProvider<R> {
    pub fn new(session: RadioSession<R>) -> Self {
        let registry = Arc::clone(session.registry());
        Self { session: Some(session), registry, rate_hz: DEFAULT_RADIO_RATE_HZ, idle_polls: 0 }
    }

    /// Override the nominal downlink rate.
    pub fn with_rate_hz(mut self, rate_hz: f64) -> Self {
        if rate_hz > 0.0 {
            self.rate_hz = rate_hz;
        }
        self
    }

    pub fn registry(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.registry)
    }

    /// Polls that ended in a read timeout so far.
    pub fn idle_polls(&self) -> u64 {
        self.idle_polls
    }
}

#[async_trait::async_trait]
impl<R: Read + Send + 'static> Provider for RadioProvider<R> {
    async fn next_update(&mut self) -> Result<Option<TelemetryUpdate>> {
        loop {
            let Some(mut session) = self.session.take() else {
                return Ok(None);
            };

            let (session, polled) = tokio::task::spawn_blocking(move || {
                let polled = session.poll();
                (session, polled)
            })
            .await
            .map_err(|e| TelemetryError::io("radio poll task", std::io::Error::other(e)))?;

            match polled {
                Ok(Some(update)) => {
                    trace!(sequence_number = update.sequence_number, "Radio update");
                    self.session = Some(session);
                    return Ok(Some(TelemetryUpdate {
                        record: update.record,
                        sequence_number: Some(update.sequence_number),
                        retention_ratio: Some(update.retention_ratio),
                    }));
                }
                Ok(None) if session.is_exhausted() => {
                    info!("Radio transport ended");
                    session.close();
                    return Ok(None);
                }
                Ok(None) => {
                    self.idle_polls += 1;
                    debug!(idle_polls = self.idle_polls, "Radio link idle");
                    self.session = Some(session);
                }
                Err(e) => {
                    self.session = Some(session);
                    return Err(e);
                }
            }
        }
    }

    fn nominal_rate_hz(&self) -> f64 {
        self.rate_hz
    }
}
