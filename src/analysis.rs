//! Post-flight analysis over decoded rows
//!
//! The flight computer logs to flash as a circular buffer, so a long session on the
//! pad can wrap and put the oldest data after the newest. These helpers find the
//! wrap point and the launch, and trim a dump down to the flight.

use tracing::debug;

use crate::types::NamedRecord;

/// Standard gravity used to convert m/s² to g.
pub const STANDARD_GRAVITY: f64 = 9.8;

/// Backward timestamp jump treated as a buffer wrap.
pub const DEFAULT_WRAP_THRESHOLD_MS: u32 = 1000;

/// Data kept before launch when trimming.
pub const DEFAULT_PRE_LAUNCH_MS: u32 = 10_000;

/// Indices where the timestamp jumps backwards by more than `threshold_ms`.
///
/// Rows without a timestamp never form a wrap point.
pub fn wrap_points(records: &[NamedRecord], threshold_ms: u32) -> Vec<usize> {
    records
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let prev = pair[0].timestamp_ms? as i64;
            let next = pair[1].timestamp_ms? as i64;
            (next - prev < -(threshold_ms as i64)).then_some(i + 1)
        })
        .collect()
}

/// Centred moving average. Positions where the window does not fit keep their raw value.
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }
    let back = window / 2;
    (0..values.len())
        .map(|i| {
            let Some(start) = i.checked_sub(back) else {
                return values[i];
            };
            let end = start + window;
            if end > values.len() {
                return values[i];
            }
            values[start..end].iter().sum::<f64>() / window as f64
        })
        .collect()
}

/// Finds launch from sustained acceleration.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchDetector {
    /// Smoothed acceleration that counts as launch, in g
    pub threshold_g: f64,
    /// Moving average width
    pub window: usize,
    /// Consecutive samples above threshold that confirm launch
    pub sustained: usize,
    /// Backward timestamp jump treated as a buffer wrap
    pub wrap_threshold_ms: u32,
    /// Acceleration fields tried in order; the first present in the data is used
    pub fields: Vec<String>,
}

impl Default for LaunchDetector {
    fn default() -> Self {
        Self {
            threshold_g: 2.0,
            window: 5,
            sustained: 3,
            wrap_threshold_ms: DEFAULT_WRAP_THRESHOLD_MS,
            fields: vec!["ACCELEROMETER_Z".into(), "ACCELEROMETER_X".into(), "ACCELEROMETER_Y".into()],
        }
    }
}

impl LaunchDetector {
    /// Index of the launch row, if any.
    pub fn detect(&self, records: &[NamedRecord]) -> Option<usize> {
        let Some(field) = self.fields.iter().find(|f| records.iter().any(|r| r.contains(f))) else {
            debug!("No acceleration field present, launch not detectable");
            return None;
        };

        let g: Vec<f64> =
            records.iter().map(|r| r.get_f64(field).unwrap_or(0.0) / STANDARD_GRAVITY).collect();
        let smoothed = centered_moving_average(&g, self.window);

        let mut above: Vec<usize> =
            smoothed.iter().enumerate().filter(|(_, v)| **v > self.threshold_g).map(|(i, _)| i).collect();

        if let Some(&wrap) = wrap_points(records, self.wrap_threshold_ms).first() {
            above.retain(|&i| i < wrap);
            debug!(wrap_index = wrap, "Restricting launch search to before buffer wrap");
        }

        let run = self.sustained.max(1);
        let launch = above
            .windows(run)
            .find(|w| w.windows(2).all(|p| p[1] - p[0] == 1))
            .map(|w| w[0])
            .or_else(|| above.first().copied());

        debug!(field = %field, launch_index = ?launch, "Launch detection finished");
        launch
    }
}

/// Rows from `pre_launch_ms` before launch to the end of the data.
///
/// Falls back to an index window (10 rows per second) when the launch row has no timestamp.
pub fn trim_around_launch(records: &[NamedRecord], launch_index: usize, pre_launch_ms: u32) -> Vec<NamedRecord> {
    let Some(launch) = records.get(launch_index) else {
        return Vec::new();
    };

    match launch.timestamp_ms {
        Some(launch_ts) => {
            let bound = launch_ts as i64 - pre_launch_ms as i64;
            records
                .iter()
                .filter(|r| r.timestamp_ms.is_some_and(|ts| ts as i64 >= bound))
                .cloned()
                .collect()
        }
        None => {
            let pre_rows = (pre_launch_ms as usize / 1000 * 10).min(launch_index);
            records[launch_index - pre_rows..].to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(samples: &[(u32, f32)]) -> Vec<NamedRecord> {
        samples
            .iter()
            .map(|&(ts, accel)| {
                let mut r = NamedRecord::new(Some(ts));
                r.insert("ACCELEROMETER_Z", accel);
                r
            })
            .collect()
    }

    #[test]
    fn wrap_points_find_backward_jumps() {
        let records = rows(&[(5000, 0.0), (5100, 0.0), (100, 0.0), (200, 0.0), (150, 0.0)]);
        assert_eq!(wrap_points(&records, 1000), vec![2]);
        assert!(wrap_points(&records[..2], 1000).is_empty());
    }

    #[test]
    fn moving_average_keeps_edges() {
        let avg = centered_moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 5);
        assert_eq!(avg, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let avg = centered_moving_average(&[0.0, 0.0, 10.0, 0.0, 0.0], 5);
        assert_eq!(avg[2], 2.0);
        assert_eq!(avg[0], 0.0);
    }

    #[test]
    fn detects_sustained_boost() {
        let mut samples: Vec<(u32, f32)> = (0..20).map(|i| (i * 100, 9.8)).collect();
        for sample in samples.iter_mut().skip(10).take(6) {
            sample.1 = 40.0;
        }
        let records = rows(&samples);
        let launch = LaunchDetector::default().detect(&records);
        // Smoothing spreads the boost one sample early.
        assert_eq!(launch, Some(9));
    }

    #[test]
    fn no_acceleration_means_no_launch() {
        let records = rows(&[(0, 9.8), (100, 9.8), (200, 9.8)]);
        assert_eq!(LaunchDetector::default().detect(&records), None);
        assert_eq!(LaunchDetector::default().detect(&[NamedRecord::new(Some(0))]), None);
    }

    #[test]
    fn launch_after_wrap_is_ignored() {
        let mut samples: Vec<(u32, f32)> = (0..10).map(|i| (10_000 + i * 100, 9.8)).collect();
        samples.extend((0..10).map(|i| (i * 100, 20.0)));
        let records = rows(&samples);
        assert_eq!(LaunchDetector::default().detect(&records), None);
    }

    #[test]
    fn falls_back_to_first_spike() {
        let detector = LaunchDetector { window: 1, ..LaunchDetector::default() };
        let records = rows(&[(0, 9.8), (100, 50.0), (200, 9.8), (300, 50.0), (400, 9.8)]);
        assert_eq!(detector.detect(&records), Some(1));
    }

    #[test]
    fn trim_keeps_pre_launch_window() {
        let records = rows(&(0..50).map(|i| (i * 1000, 0.0)).collect::<Vec<_>>());
        let trimmed = trim_around_launch(&records, 30, DEFAULT_PRE_LAUNCH_MS);
        assert_eq!(trimmed.first().and_then(|r| r.timestamp_ms), Some(20_000));
        assert_eq!(trimmed.len(), 30);
        assert!(trim_around_launch(&records, 99, 1000).is_empty());
    }

    #[test]
    fn trim_without_timestamps_uses_rows() {
        let records: Vec<NamedRecord> = (0..200).map(|_| NamedRecord::new(None)).collect();
        let trimmed = trim_around_launch(&records, 150, 5000);
        assert_eq!(trimmed.len(), 100);
    }
}
