//! Windowed kinematics over persisted marker rows

use super::filter::LowPassFilter;
use super::source::{FrameSource, PersistedRow};
use crate::{MocapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

/// Whether aggregated positions are low-pass filtered before distance and
/// velocity are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Smoothing {
    #[default]
    Disabled,
    Enabled,
}

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TrackerConfig {
    /// Rows expected per frame (one per tracked marker)
    pub marker_count: usize,
    pub sample_rate_hz: u32,
    /// Frames considered when no explicit count is given
    pub window_size_frames: u32,
    pub smoothing: Smoothing,
    /// Low-pass cutoff used when smoothing is enabled
    pub cutoff_hz: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            marker_count: 1,
            sample_rate_hz: 120,
            window_size_frames: 5,
            smoothing: Smoothing::Disabled,
            cutoff_hz: 10.0,
        }
    }
}

impl TrackerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| MocapError::parse("Tracker config YAML", e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| MocapError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }
}

/// A persisted row converted to integer millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FrameRow {
    pub frame_number: i64,
    pub pos_x: i64,
    pub pos_y: i64,
    pub pos_z: i64,
}

impl FrameRow {
    pub fn new(frame_number: i64, pos_x: i64, pos_y: i64, pos_z: i64) -> Self {
        Self { frame_number, pos_x, pos_y, pos_z }
    }
}

impl From<PersistedRow> for FrameRow {
    fn from(row: PersistedRow) -> Self {
        Self {
            frame_number: row.frame_number,
            pos_x: to_millimetres(row.pos_x),
            pos_y: to_millimetres(row.pos_y),
            pos_z: to_millimetres(row.pos_z),
        }
    }
}

/// Metres to whole millimetres, ties to even.
fn to_millimetres(metres: f64) -> i64 {
    (metres * 1000.0).round_ties_even() as i64
}

/// Mean marker position of one frame, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Position {
    pub frame_number: i64,
    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,
}

impl Position {
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = other.pos_x - self.pos_x;
        let dy = other.pos_y - self.pos_y;
        let dz = other.pos_z - self.pos_z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Queries a row source and derives position, distance and velocity.
///
/// All results are in millimetres (and millimetres per second).
#[derive(Debug, Default)]
pub struct Tracker {
    config: TrackerConfig,
    source: Option<Box<dyn FrameSource>>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config, source: None }
    }

    pub fn with_source(config: TrackerConfig, source: impl FrameSource + 'static) -> Self {
        Self { config, source: Some(Box::new(source)) }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn marker_count(&self) -> usize {
        self.config.marker_count
    }

    pub fn set_marker_count(&mut self, marker_count: usize) {
        self.config.marker_count = marker_count;
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.config.sample_rate_hz
    }

    pub fn set_sample_rate_hz(&mut self, sample_rate_hz: u32) {
        self.config.sample_rate_hz = sample_rate_hz;
    }

    pub fn window_size_frames(&self) -> u32 {
        self.config.window_size_frames
    }

    pub fn set_window_size_frames(&mut self, window_size_frames: u32) {
        self.config.window_size_frames = window_size_frames;
    }

    pub fn smoothing(&self) -> Smoothing {
        self.config.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: Smoothing) {
        self.config.smoothing = smoothing;
    }

    pub fn set_source(&mut self, source: impl FrameSource + 'static) {
        self.source = Some(Box::new(source));
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn frames_or_window(&self, num_frames: i64) -> i64 {
        if num_frames == 0 { i64::from(self.config.window_size_frames) } else { num_frames }
    }

    /// Rows belonging to the most recent `num_frames` frame numbers.
    ///
    /// `0` means the configured window. Frames are selected relative to the
    /// highest frame number present: `frame_number > max - num_frames`.
    pub fn query_recent_frames(&self, num_frames: i64) -> Result<Vec<FrameRow>> {
        let source =
            self.source.as_ref().ok_or_else(|| MocapError::configuration("No data source was set"))?;
        if num_frames < 0 {
            return Err(MocapError::domain(format!(
                "Number of frames cannot be negative (got {})",
                num_frames
            )));
        }

        let rows: Vec<FrameRow> = source.read_rows()?.into_iter().map(FrameRow::from).collect();
        let Some(last_frame) = rows.iter().map(|r| r.frame_number).max() else {
            return Ok(Vec::new());
        };

        // A window reaching below i64::MIN covers every row.
        let window = self.frames_or_window(num_frames);
        let recent: Vec<FrameRow> = match last_frame.checked_sub(window) {
            Some(lookback) => rows.into_iter().filter(|r| r.frame_number > lookback).collect(),
            None => rows,
        };
        trace!("Queried {} rows up to frame {}", recent.len(), last_frame);
        Ok(recent)
    }

    /// Mean position per frame number, ascending.
    ///
    /// Frame numbers with no rows are skipped. A frame whose row count is
    /// not `marker_count` is rejected with [`MocapError::FrameIntegrity`].
    pub fn aggregate_by_frame(&self, rows: &[FrameRow]) -> Result<Vec<Position>> {
        let mut frames: BTreeMap<i64, (usize, [i64; 3])> = BTreeMap::new();
        for row in rows {
            let (count, sums) = frames.entry(row.frame_number).or_insert((0, [0; 3]));
            *count += 1;
            for (sum, value) in sums.iter_mut().zip([row.pos_x, row.pos_y, row.pos_z]) {
                *sum = sum.checked_add(value).ok_or_else(|| {
                    MocapError::domain(format!(
                        "Position sum for frame {} exceeds the millimetre range",
                        row.frame_number
                    ))
                })?;
            }
        }

        frames
            .into_iter()
            .map(|(frame_number, (count, sums))| {
                if count != self.config.marker_count {
                    return Err(MocapError::FrameIntegrity {
                        frame_number,
                        expected: self.config.marker_count,
                        found: count,
                    });
                }
                let n = count as f64;
                Ok(Position {
                    frame_number,
                    pos_x: sums[0] as f64 / n,
                    pos_y: sums[1] as f64 / n,
                    pos_z: sums[2] as f64 / n,
                })
            })
            .collect()
    }

    /// Zero-phase low-pass each axis of an aggregated series.
    pub fn smooth(&self, series: &[Position]) -> Result<Vec<Position>> {
        let filter =
            LowPassFilter::butterworth(self.config.cutoff_hz, f64::from(self.config.sample_rate_hz))?;
        let axis = |get: fn(&Position) -> f64| {
            filter.filtfilt(&series.iter().map(get).collect::<Vec<_>>())
        };
        let xs = axis(|p| p.pos_x);
        let ys = axis(|p| p.pos_y);
        let zs = axis(|p| p.pos_z);

        Ok(series
            .iter()
            .enumerate()
            .map(|(i, p)| Position { frame_number: p.frame_number, pos_x: xs[i], pos_y: ys[i], pos_z: zs[i] })
            .collect())
    }

    /// Mean position of the most recent frame (never smoothed).
    pub fn position(&self) -> Result<Position> {
        let rows = self.query_recent_frames(1)?;
        self.aggregate_by_frame(&rows)?
            .pop()
            .ok_or_else(|| MocapError::domain("Data source holds no frames"))
    }

    /// Straight-line distance between the first and last positions of the
    /// last `num_frames` frames (`0` means the configured window).
    pub fn distance(&self, num_frames: i64) -> Result<f64> {
        let rows = self.query_recent_frames(num_frames)?;
        let mut series = self.aggregate_by_frame(&rows)?;
        if self.config.smoothing == Smoothing::Enabled {
            series = self.smooth(&series)?;
        }

        match (series.first(), series.last()) {
            (Some(first), Some(last)) => {
                let distance = first.distance_to(last);
                debug!(
                    "Distance over frames {}..={}: {:.3} mm",
                    first.frame_number, last.frame_number, distance
                );
                Ok(distance)
            }
            _ => Err(MocapError::domain("Data source holds no frames")),
        }
    }

    /// Distance over `num_frames` divided by the duration of the configured
    /// window (`window_size_frames / sample_rate_hz`).
    pub fn velocity(&self, num_frames: i64) -> Result<f64> {
        let num_frames = self.frames_or_window(num_frames);
        if num_frames < 2 {
            return Err(MocapError::domain(format!(
                "Velocity needs a window of at least two frames (got {})",
                num_frames
            )));
        }
        if self.config.window_size_frames < 2 {
            return Err(MocapError::domain(format!(
                "Configured window must cover at least two frames (is {})",
                self.config.window_size_frames
            )));
        }
        if self.config.sample_rate_hz == 0 {
            return Err(MocapError::configuration("Sample rate must be positive"));
        }

        let window_seconds =
            f64::from(self.config.window_size_frames) / f64::from(self.config.sample_rate_hz);
        Ok(self.distance(num_frames)? / window_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::MemoryFrameSource;

    fn rows_mm(data: &[(i64, i64, i64, i64)]) -> Vec<FrameRow> {
        data.iter().map(|&(f, x, y, z)| FrameRow::new(f, x, y, z)).collect()
    }

    /// Persisted (metre) rows for frames given in millimetres.
    fn source_mm(data: &[(i64, i64, i64, i64)]) -> MemoryFrameSource {
        MemoryFrameSource::from_rows(data.iter().map(|&(f, x, y, z)| {
            PersistedRow::new(f, x as f64 / 1000.0, y as f64 / 1000.0, z as f64 / 1000.0)
        }))
    }

    fn three_markers(window: u32) -> TrackerConfig {
        TrackerConfig { marker_count: 3, window_size_frames: window, ..Default::default() }
    }

    const TWO_FRAMES: [(i64, i64, i64, i64); 6] =
        [(1, 0, 0, 0), (1, 2, 0, 0), (1, 1, 3, 0), (2, 0, 0, 2), (2, 2, 0, 2), (2, 1, 3, 2)];

    #[test]
    fn aggregate_means_each_frame() {
        let tracker = Tracker::new(three_markers(5));
        let rows = rows_mm(&[
            (1, 0, 0, 0),
            (1, 2, 0, 0),
            (1, 1, 3, 0),
            (2, 0, 0, 3),
            (2, 2, 0, 3),
            (2, 1, 3, 3),
        ]);
        let means = tracker.aggregate_by_frame(&rows).unwrap();
        assert_eq!(means.len(), 2);
        assert_eq!((means[0].pos_x, means[0].pos_y, means[0].pos_z), (1.0, 1.0, 0.0));
        assert_eq!((means[1].pos_x, means[1].pos_y, means[1].pos_z), (1.0, 1.0, 3.0));

        let means = tracker.aggregate_by_frame(&rows_mm(&TWO_FRAMES)).unwrap();
        assert_eq!((means[1].pos_x, means[1].pos_y, means[1].pos_z), (1.0, 1.0, 2.0));
    }

    #[test]
    fn aggregate_orders_frames_and_skips_gaps() {
        let tracker = Tracker::new(TrackerConfig { marker_count: 1, ..Default::default() });
        let rows = rows_mm(&[(9, 3, 0, 0), (7, 1, 0, 0), (12, 6, 0, 0)]);
        let frames: Vec<i64> =
            tracker.aggregate_by_frame(&rows).unwrap().iter().map(|p| p.frame_number).collect();
        assert_eq!(frames, vec![7, 9, 12]);
        assert!(tracker.aggregate_by_frame(&[]).unwrap().is_empty());
    }

    #[test]
    fn partial_frame_is_an_integrity_error() {
        let tracker = Tracker::new(three_markers(5));
        let rows = rows_mm(&[(1, 0, 0, 0), (1, 2, 0, 0), (1, 1, 3, 0), (2, 0, 0, 3), (2, 2, 0, 3)]);
        match tracker.aggregate_by_frame(&rows) {
            Err(MocapError::FrameIntegrity { frame_number, expected, found }) => {
                assert_eq!((frame_number, expected, found), (2, 3, 2));
            }
            other => panic!("expected integrity error, got {:?}", other),
        }
    }

    #[test]
    fn millimetres_round_half_to_even() {
        assert_eq!(to_millimetres(0.0025), 2);
        assert_eq!(to_millimetres(0.0035), 4);
        assert_eq!(to_millimetres(-0.0025), -2);
        assert_eq!(to_millimetres(1.2344), 1234);
        let row = FrameRow::from(PersistedRow::new(4, 0.1, 0.2, 0.3));
        assert_eq!(row, FrameRow::new(4, 100, 200, 300));
    }

    #[test]
    fn query_selects_by_highest_frame_number() {
        let source = source_mm(&[(10, 0, 0, 0), (13, 0, 0, 0), (11, 0, 0, 0), (12, 0, 0, 0)]);
        let tracker = Tracker::with_source(TrackerConfig::default(), source);

        let frames = |n| -> Vec<i64> {
            tracker.query_recent_frames(n).unwrap().iter().map(|r| r.frame_number).collect()
        };
        assert_eq!(frames(2), vec![13, 12]);
        assert_eq!(frames(0), vec![10, 13, 11, 12]);
        assert_eq!(frames(1), vec![13]);
    }

    #[test]
    fn query_validates_source_and_count() {
        let tracker = Tracker::new(TrackerConfig::default());
        assert!(matches!(tracker.query_recent_frames(3), Err(MocapError::Configuration { .. })));

        let tracker = Tracker::with_source(TrackerConfig::default(), MemoryFrameSource::new());
        assert!(matches!(tracker.query_recent_frames(-1), Err(MocapError::Domain { .. })));
        assert!(tracker.query_recent_frames(3).unwrap().is_empty());
        assert!(matches!(tracker.position(), Err(MocapError::Domain { .. })));
    }

    #[test]
    fn position_is_latest_frame_mean() {
        let tracker = Tracker::with_source(three_markers(5), source_mm(&TWO_FRAMES));
        let position = tracker.position().unwrap();
        assert_eq!(position.frame_number, 2);
        assert_eq!((position.pos_x, position.pos_y, position.pos_z), (1.0, 1.0, 2.0));
    }

    #[test]
    fn distance_between_first_and_last_frame() {
        let tracker = Tracker::with_source(three_markers(5), source_mm(&TWO_FRAMES));
        assert_eq!(tracker.distance(0).unwrap(), 2.0);
        assert_eq!(tracker.distance(2).unwrap(), 2.0);
        assert_eq!(tracker.distance(1).unwrap(), 0.0);
    }

    #[test]
    fn velocity_divides_by_configured_window() {
        let mut tracker = Tracker::with_source(three_markers(5), source_mm(&TWO_FRAMES));
        tracker.set_sample_rate_hz(120);
        assert!((tracker.velocity(0).unwrap() - 48.0).abs() < 1e-9);
        assert!((tracker.velocity(2).unwrap() - 48.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_needs_two_frames() {
        let mut tracker = Tracker::with_source(three_markers(5), source_mm(&TWO_FRAMES));
        assert!(matches!(tracker.velocity(1), Err(MocapError::Domain { .. })));
        assert!(matches!(tracker.velocity(-3), Err(MocapError::Domain { .. })));

        tracker.set_window_size_frames(1);
        assert!(matches!(tracker.velocity(0), Err(MocapError::Domain { .. })));
        assert!(matches!(tracker.velocity(2), Err(MocapError::Domain { .. })));
    }

    #[test]
    fn smoothing_toggle_controls_distance() {
        // Single marker moving along z with alternating jitter.
        let data: Vec<(i64, i64, i64, i64)> =
            (0..12).map(|i| (i, 5, 5, i * 10 + if i % 2 == 0 { -6 } else { 6 })).collect();
        let mut tracker = Tracker::with_source(
            TrackerConfig { marker_count: 1, window_size_frames: 12, ..Default::default() },
            source_mm(&data),
        );

        assert_eq!(tracker.smoothing(), Smoothing::Disabled);
        let raw = tracker.distance(0).unwrap();
        assert_eq!(raw, 122.0);

        tracker.set_smoothing(Smoothing::Enabled);
        let smoothed = tracker.distance(0).unwrap();

        // Second-order Butterworth (10 Hz at 120 Hz) run forward and backward
        // with 9-sample odd padding: z[0] -> -6.08733, z[11] -> 116.92082.
        assert!((smoothed - 123.008_148_355).abs() < 1e-6, "smoothed {}", smoothed);
        assert!((smoothed - raw).abs() > 1e-3);
    }

    #[test]
    fn extreme_frame_numbers_do_not_overflow() {
        let source = source_mm(&[(i64::MIN, 0, 0, 0), (i64::MIN + 1, 0, 0, 1)]);
        let tracker = Tracker::with_source(TrackerConfig::default(), source);
        assert_eq!(tracker.query_recent_frames(5).unwrap().len(), 2);
        assert_eq!(tracker.distance(0).unwrap(), 1.0);
    }

    #[test]
    fn overflowing_position_sums_are_a_domain_error() {
        let tracker = Tracker::new(TrackerConfig { marker_count: 2, ..Default::default() });
        let rows = rows_mm(&[(1, i64::MAX, 0, 0), (1, 1, 0, 0)]);
        assert!(matches!(tracker.aggregate_by_frame(&rows), Err(MocapError::Domain { .. })));
    }

    #[test]
    fn smoothing_rejects_cutoff_above_nyquist() {
        let tracker = Tracker::new(TrackerConfig {
            sample_rate_hz: 15,
            smoothing: Smoothing::Enabled,
            ..Default::default()
        });
        let series = [Position { frame_number: 1, pos_x: 0.0, pos_y: 0.0, pos_z: 0.0 }; 3];
        assert!(matches!(tracker.smooth(&series), Err(MocapError::Configuration { .. })));
    }

    #[test]
    fn config_loads_from_yaml() {
        let config =
            TrackerConfig::from_yaml_str("marker_count: 4\nsmoothing: enabled\n").unwrap();
        assert_eq!(config.marker_count, 4);
        assert_eq!(config.smoothing, Smoothing::Enabled);
        assert_eq!(config.sample_rate_hz, 120);
        assert_eq!(config.window_size_frames, 5);
        assert!(TrackerConfig::from_yaml_str("smoothing: sometimes").is_err());
    }
}
