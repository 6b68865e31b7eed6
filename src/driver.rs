//! Driver spawns and manages the record reader task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::provider::Provider;
use crate::types::NamedRecord;

/// Consecutive provider errors tolerated before the reader gives up.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Lifecycle of the source behind a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// No record delivered yet
    Starting,
    /// At least one record delivered
    Streaming,
    /// The provider reported end of stream
    Ended,
    /// Stopped after too many consecutive provider errors
    Failed,
    /// Stopped by cancellation
    Cancelled,
}

impl SourceState {
    pub fn is_finished(self) -> bool {
        matches!(self, SourceState::Ended | SourceState::Failed | SourceState::Cancelled)
    }
}

/// Result of spawning driver tasks
pub struct DriverChannels {
    /// Latest record, `None` until the first arrives
    pub records: watch::Receiver<Option<Arc<NamedRecord>>>,
    /// Latest retention ratio; stays at `1.0` for sources without a link
    pub retention: watch::Receiver<f64>,
    /// Source lifecycle
    pub state: watch::Receiver<SourceState>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the record reader task
///
/// The reader task owns the provider. When the provider ends the record sender is
/// dropped, so receivers keep the last record and streams over them terminate.
pub struct Driver;

impl Driver {
    /// Spawn the reader task for the given provider.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<P>(provider: P) -> DriverChannels
    where
        P: Provider,
    {
        let (record_tx, record_rx) = watch::channel(None);
        let (retention_tx, retention_rx) = watch::channel(1.0);
        let (state_tx, state_rx) = watch::channel(SourceState::Starting);
        let cancel = CancellationToken::new();

        let cancel_reader = cancel.clone();
        tokio::spawn(async move {
            Self::record_reader_task(provider, record_tx, retention_tx, state_tx, cancel_reader).await;
        });

        DriverChannels { records: record_rx, retention: retention_rx, state: state_rx, cancel }
    }

    async fn record_reader_task<P>(
        mut provider: P,
        record_tx: watch::Sender<Option<Arc<NamedRecord>>>,
        retention_tx: watch::Sender<f64>,
        state_tx: watch::Sender<SourceState>,
        cancel: CancellationToken,
    ) where
        P: Provider,
    {
        info!("Record reader task started");
        let mut record_count = 0u64;
        let mut error_count = 0u32;

        let final_state = loop {
            if cancel.is_cancelled() {
                info!("Record reader cancelled");
                break SourceState::Cancelled;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Record reader cancelled during read");
                    break SourceState::Cancelled;
                }
                result = provider.next_update() => result,
            };

            match result {
                Ok(Some(update)) => {
                    record_count += 1;
                    error_count = 0;
                    trace!(record_count, sequence_number = ?update.sequence_number, "Record");

                    if let Some(ratio) = update.retention_ratio {
                        retention_tx.send_if_modified(|current| {
                            let changed = *current != ratio;
                            *current = ratio;
                            changed
                        });
                    }

                    if record_count == 1 {
                        let _ = state_tx.send(SourceState::Streaming);
                    }

                    if record_tx.send(Some(Arc::new(update.record))).is_err() {
                        debug!("Record receivers dropped, shutting down");
                        break SourceState::Cancelled;
                    }
                }
                Ok(None) => {
                    info!(record_count, "Provider stream ended");
                    break SourceState::Ended;
                }
                Err(e) => {
                    // Transient failures are retried with backoff
                    error_count += 1;
                    error!(error_count, max = MAX_CONSECUTIVE_ERRORS, error = %e, "Provider error");

                    if error_count >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many provider errors, shutting down");
                        break SourceState::Failed;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break SourceState::Cancelled,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        };

        let _ = state_tx.send(final_state);
        info!(record_count, state = ?final_state, "Record reader task ended");
    }
}
