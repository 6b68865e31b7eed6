//! Connections: subscribe to the records of a running source
//!
//! A [`Connection`] owns the driver task of one source. Any number of subscribers
//! can read from it at their own rate; each receives the newest record, so a slow
//! subscriber skips records instead of queueing them.

use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::driver::{Driver, SourceState};
use crate::provider::Provider;
use crate::schema::SchemaRegistry;
use crate::stream::ThrottleExt;
use crate::types::{NamedRecord, UpdateRate};

mod dump;
mod radio;


/// How long `open_*` constructors wait for a first record before returning anyway.
pub const FIRST_RECORD_TIMEOUT: Duration = Duration::from_secs(5);

/// A running record source.
pub struct Connection {
    records: watch::Receiver<Option<Arc<NamedRecord>>>,
    retention: watch::Receiver<f64>,
    state: watch::Receiver<SourceState>,
    registry: Arc<SchemaRegistry>,
    source_hz: f64,
    cancel: CancellationToken,
}

impl Connection {
    /// Start driving `provider`, whose records are named by `registry`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_provider<P: Provider>(provider: P, registry: Arc<SchemaRegistry>) -> Self {
        let source_hz = provider.nominal_rate_hz();
        let channels = Driver::spawn(provider);
        Self {
            records: channels.records,
            retention: channels.retention,
            state: channels.state,
            registry,
            source_hz,
            cancel: channels.cancel,
        }
    }

    /// Wait until the first record is published, the source finishes, or `timeout` passes.
    pub(crate) async fn wait_for_first_record(&self, timeout: Duration) {
        let mut records = self.records.clone();
        let waited = tokio::time::timeout(timeout, async {
            while records.borrow_and_update().is_none() {
                if records.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;

        if waited.is_err() {
            warn!(timeout_ms = timeout.as_millis() as u64, "Timeout waiting for first record");
        }
    }

    /// Subscribe to records at `rate`.
    ///
    /// The stream starts with the current record, if any, and ends when the source does.
    pub fn subscribe(&self, rate: UpdateRate) -> BoxStream<'static, Arc<NamedRecord>> {
        let records = WatchStream::new(self.records.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval(self.source_hz) {
            None => records.boxed(),
            Some(interval) => records.throttle(interval).boxed(),
        }
    }

    /// Retention ratio changes, starting with the current value.
    pub fn retention_updates(&self) -> impl futures::Stream<Item = f64> + 'static {
        WatchStream::new(self.retention.clone())
    }

    /// Source lifecycle changes, starting with the current state.
    pub fn state_updates(&self) -> impl futures::Stream<Item = SourceState> + 'static {
        WatchStream::new(self.state.clone())
    }

    /// Latest retention ratio. Sources without a radio link stay at `1.0`.
    pub fn retention_ratio(&self) -> f64 {
        *self.retention.borrow()
    }

    pub fn current_record(&self) -> Option<Arc<NamedRecord>> {
        self.records.borrow().clone()
    }

    pub fn state(&self) -> SourceState {
        *self.state.borrow()
    }

    /// Wait until the source has ended, failed or been cancelled.
    pub async fn finished(&self) -> SourceState {
        let mut state = self.state.clone();
        let finished = state.wait_for(|s| s.is_finished()).await.map(|s| *s);
        finished.unwrap_or_else(|_| *state.borrow())
    }

    /// Nominal records per second of the source.
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Stop the source. Subscriber streams end once they drain.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!("Dropping connection");
        self.cancel.cancel();
    }
}
