//! Playback provider for decoded flash dumps

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::Result;
use crate::assembler::RecordAssembler;
use crate::protocol::{FlashDump, FlashDumpDecoder, FlashLayout};
use crate::provider::{Provider, TelemetryUpdate};
use crate::schema::SchemaRegistry;
use crate::types::NamedRecord;

/// Default playback rate for stored rows.
pub const DEFAULT_PLAYBACK_HZ: f64 = 100.0;

/// Provider that plays back stored rows in order, then ends.
pub struct DumpProvider {
    records: VecDeque<NamedRecord>,
    total: usize,
    rate_hz: f64,
    pacing: Option<Interval>,
}

impl DumpProvider {
    pub fn new(records: Vec<NamedRecord>) -> Self {
        let total = records.len();
        Self { records: records.into(), total, rate_hz: DEFAULT_PLAYBACK_HZ, pacing: None }
    }

    /// Name every row of a decoded dump.
    pub fn from_dump(dump: &FlashDump, registry: Arc<SchemaRegistry>) -> Self {
        Self::new(RecordAssembler::new(registry).assemble_dump(dump))
    }

    /// Decode a saved dump file.
    pub fn from_file<P: AsRef<Path>>(path: P, registry: Arc<SchemaRegistry>, layout: FlashLayout) -> Result<Self> {
        let path = path.as_ref();
        let decoder = FlashDumpDecoder::with_layout(Arc::clone(&registry), layout)?;
        let dump = decoder.decode_file(path)?;
        info!(
            path = %path.display(),
            rows = dump.len(),
            corrupt_pages = dump.stats.corrupt_pages,
            "Loaded flash dump for playback"
        );
        Ok(Self::from_dump(&dump, registry))
    }

    /// Set rows per second. Zero or negative plays back as fast as consumers read.
    pub fn with_playback_rate(mut self, rate_hz: f64) -> Self {
        self.rate_hz = rate_hz;
        self.pacing = None;
        debug!(rate_hz, "Playback rate set");
        self
    }

    /// Rows not yet delivered.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn pacing(&mut self) -> Option<&mut Interval> {
        if self.rate_hz <= 0.0 || !self.rate_hz.is_finite() {
            return None;
        }
        let rate_hz = self.rate_hz;
        Some(self.pacing.get_or_insert_with(|| {
            let mut pacing = interval(Duration::from_secs_f64(1.0 / rate_hz));
            pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
            pacing
        }))
    }
}

#[async_trait::async_trait]
impl Provider for DumpProvider {
    async fn next_update(&mut self) -> Result<Option<TelemetryUpdate>> {
        if self.records.is_empty() {
            debug!(total = self.total, "Reached end of dump");
            return Ok(None);
        }

        if let Some(pacing) = self.pacing() {
            pacing.tick().await;
        }

        let Some(record) = self.records.pop_front() else {
            return Ok(None);
        };
        trace!(row = self.total - self.records.len(), timestamp_ms = ?record.timestamp_ms, "Dump row");
        Ok(Some(TelemetryUpdate::from_record(record)))
    }

    fn nominal_rate_hz(&self) -> f64 {
        if self.rate_hz > 0.0 { self.rate_hz } else { f64::INFINITY }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FlashPageBuilder, test_registry};
    use std::io::Write;

    fn rows(n: u32) -> Vec<NamedRecord> {
        (0..n)
            .map(|i| {
                let mut r = NamedRecord::new(Some(i * 10));
                r.insert("ALTITUDE", i as f32);
                r
            })
            .collect()
    }

    #[tokio::test]
    async fn plays_rows_in_order_then_ends() {
        let mut provider = DumpProvider::new(rows(3)).with_playback_rate(0.0);
        assert_eq!(provider.total(), 3);

        for expected in 0..3 {
            let update = provider.next_update().await.unwrap().unwrap();
            assert_eq!(update.record.timestamp_ms, Some(expected * 10));
            assert!(update.sequence_number.is_none());
            assert!(update.retention_ratio.is_none());
        }
        assert_eq!(provider.remaining(), 0);
        assert!(provider.next_update().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn paced_playback_takes_time() {
        let mut provider = DumpProvider::new(rows(4)).with_playback_rate(200.0);
        let start = std::time::Instant::now();
        while provider.next_update().await.unwrap().is_some() {}
        // First tick is immediate, the remaining three wait 5 ms each.
        assert!(start.elapsed() >= Duration::from_millis(14));
    }

    #[test]
    fn unpaced_rate_is_unbounded() {
        assert_eq!(DumpProvider::new(Vec::new()).nominal_rate_hz(), DEFAULT_PLAYBACK_HZ);
        assert!(DumpProvider::new(Vec::new()).with_playback_rate(0.0).nominal_rate_hz().is_infinite());
    }

    #[tokio::test]
    async fn loads_dump_file() {
        let layout = FlashLayout::default();
        let data = FlashPageBuilder::new(layout.clone())
            .timestamp(14, 500)
            .float(8, 42.0)
            .timestamp(14, 510)
            .float(8, 43.0)
            .eof()
            .build();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let mut provider =
            DumpProvider::from_file(file.path(), test_registry(), layout).unwrap().with_playback_rate(0.0);
        assert_eq!(provider.total(), 2);
        let first = provider.next_update().await.unwrap().unwrap();
        assert_eq!(first.record.get_f64("ALTITUDE"), Some(42.0));
        assert_eq!(first.record.timestamp_ms, Some(500));
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let result = DumpProvider::from_file("/nonexistent/dump.bin", test_registry(), FlashLayout::default());
        assert!(matches!(result, Err(crate::TelemetryError::File { .. })));
    }
}
