//! Window builder
//!
//! Slices a patient's readings into fixed-duration windows and computes
//! per-signal statistics for each. Windows use inclusive `[start, end]`
//! bounds, so a reading exactly on a shared boundary lands in both
//! neighbours.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::types::{hours, Reading, VitalSign, WindowSpec};

/// Statistics of one signal inside one window.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalStats {
    pub values: Vec<f64>,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl SignalStats {
    /// `None` for an empty slice.
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { values, avg, min, max })
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }
}

/// One slice of history.
///
/// Serializes flat: `window_index`, `window_label`, `start_time`, `end_time`
/// plus `{key}_values`, `{key}_avg`, `{key}_min` and `{key}_max` per signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "FlatWindow", try_from = "FlatWindow")]
pub struct TimeWindow {
    pub index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub stats: BTreeMap<VitalSign, SignalStats>,
}

impl TimeWindow {
    pub fn new(index: usize, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            index,
            start,
            end,
            stats: BTreeMap::new(),
        }
    }

    /// `"Window {index + 1}"`
    pub fn label(&self) -> String {
        format!("Window {}", self.index + 1)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn get(&self, sign: VitalSign) -> Option<&SignalStats> {
        self.stats.get(&sign)
    }

    /// Compute stats from every reading inside the window.
    fn fill(&mut self, readings: &[Reading]) {
        let mut grouped: BTreeMap<VitalSign, Vec<f64>> = BTreeMap::new();
        for r in readings.iter().filter(|r| self.contains(r.timestamp)) {
            grouped.entry(r.signal).or_default().push(r.value);
        }
        self.stats = grouped
            .into_iter()
            .filter_map(|(sign, values)| SignalStats::from_values(values).map(|s| (sign, s)))
            .collect();
    }
}

/// Build `spec.window_count` windows ending at `end`.
///
/// `start_i = end - span + i*(d+g)`, `end_i = min(start_i + d, end)`. Empty
/// windows are kept as shells so indices stay contiguous.
pub fn build_windows(readings: &[Reading], spec: &WindowSpec, end: DateTime<Utc>) -> Vec<TimeWindow> {
    let start = spec.calculated_start(end);
    let stride = spec.window_duration_hours + spec.window_interval_hours;

    (0..spec.window_count)
        .map(|i| {
            let w_start = start + hours(i as f64 * stride);
            let w_end = (w_start + hours(spec.window_duration_hours)).min(end);
            let mut window = TimeWindow::new(i, w_start, w_end);
            window.fill(readings);
            window
        })
        .collect()
}

/// Windows laid out forward from `range_start`, used when a trend analysis
/// arrives without prebuilt windows.
///
/// Windows ending after `range_end` are skipped and windows without
/// readings are dropped, so indices may have gaps.
pub fn trend_windows_from_range(
    readings: &[Reading],
    spec: &WindowSpec,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> Vec<TimeWindow> {
    let stride = spec.window_duration_hours + spec.window_interval_hours;

    (0..spec.window_count)
        .filter_map(|i| {
            let w_start = range_start + hours(i as f64 * stride);
            let w_end = w_start + hours(spec.window_duration_hours);
            if w_end > range_end {
                return None;
            }
            let mut window = TimeWindow::new(i, w_start, w_end);
            window.fill(readings);
            (!window.is_empty()).then_some(window)
        })
        .collect()
}

// ============================================================================
// Flat wire form
// ============================================================================

#[derive(Serialize, Deserialize)]
struct FlatWindow {
    window_index: usize,
    #[serde(default)]
    window_label: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(flatten)]
    stats: Map<String, Value>,
}

impl From<TimeWindow> for FlatWindow {
    fn from(w: TimeWindow) -> Self {
        let window_label = w.label();
        let mut stats = Map::new();
        for (sign, s) in w.stats {
            let key = sign.key();
            stats.insert(format!("{key}_avg"), Value::from(s.avg));
            stats.insert(format!("{key}_min"), Value::from(s.min));
            stats.insert(format!("{key}_max"), Value::from(s.max));
            stats.insert(format!("{key}_values"), Value::from(s.values));
        }
        Self {
            window_index: w.index,
            window_label,
            start_time: w.start,
            end_time: w.end,
            stats,
        }
    }
}

impl TryFrom<FlatWindow> for TimeWindow {
    type Error = String;

    fn try_from(flat: FlatWindow) -> Result<Self, Self::Error> {
        let mut window = TimeWindow::new(flat.window_index, flat.start_time, flat.end_time);
        for sign in VitalSign::ALL {
            let Some(raw) = flat.stats.get(&format!("{}_values", sign.key())) else {
                continue;
            };
            let values: Vec<f64> = serde_json::from_value(raw.clone())
                .map_err(|e| format!("{}_values: {e}", sign.key()))?;
            if let Some(stats) = SignalStats::from_values(values) {
                window.stats.insert(sign, stats);
            }
        }
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 26, 18, 0, 0).unwrap()
    }

    fn hr(ts: DateTime<Utc>, value: f64) -> Reading {
        Reading::new(ts, VitalSign::HeartRate, value, "p1", "d1")
    }

    #[test]
    fn test_five_by_six_hours_tiles_thirty_hours() {
        let windows = build_windows(&[], &WindowSpec::new(5, 6.0, 0.0), end());
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].start, end() - Duration::hours(30));
        assert_eq!(windows[4].end, end());
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap between windows");
            assert_eq!(pair[0].end - pair[0].start, Duration::hours(6));
        }
    }

    #[test]
    fn test_interval_span() {
        let windows = build_windows(&[], &WindowSpec::new(3, 4.0, 2.0), end());
        assert_eq!(windows[0].start, end() - Duration::hours(16));
        assert_eq!(windows[1].start, end() - Duration::hours(10));
        assert_eq!(windows[2].end, end());
    }

    #[test]
    fn test_empty_windows_are_shells() {
        let readings = vec![hr(end() - Duration::hours(1), 70.0)];
        let windows = build_windows(&readings, &WindowSpec::new(3, 2.0, 0.0), end());
        assert_eq!(windows.len(), 3);
        assert!(windows[0].is_empty());
        assert!(windows[1].is_empty());
        assert_eq!(windows[2].get(VitalSign::HeartRate).unwrap().count(), 1);
        assert_eq!(windows[1].label(), "Window 2");
    }

    #[test]
    fn test_boundary_reading_counts_in_both_windows() {
        let boundary = end() - Duration::hours(6);
        let readings = vec![hr(boundary, 75.0)];
        let windows = build_windows(&readings, &WindowSpec::new(2, 6.0, 0.0), end());
        assert!(windows[0].get(VitalSign::HeartRate).is_some());
        assert!(windows[1].get(VitalSign::HeartRate).is_some());
    }

    #[test]
    fn test_stats() {
        let base = end() - Duration::hours(1);
        let readings = vec![
            hr(base, 70.0),
            hr(base + Duration::minutes(10), 80.0),
            hr(base + Duration::minutes(20), 90.0),
        ];
        let windows = build_windows(&readings, &WindowSpec::new(1, 2.0, 0.0), end());
        let s = windows[0].get(VitalSign::HeartRate).unwrap();
        assert_eq!(s.avg, 80.0);
        assert_eq!(s.min, 70.0);
        assert_eq!(s.max, 90.0);
    }

    #[test]
    fn test_forward_layout_skips_and_drops() {
        let start = end() - Duration::hours(10);
        let readings = vec![hr(start + Duration::hours(5), 72.0)];
        // Windows [0,4], [4,8], [8,12]; the third passes the range end
        let windows = trend_windows_from_range(&readings, &WindowSpec::new(3, 4.0, 0.0), start, end());
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].index, 1);
    }

    #[test]
    fn test_flat_serialization() {
        let base = end() - Duration::hours(1);
        let readings = vec![hr(base, 70.0), hr(base + Duration::minutes(5), 74.0)];
        let windows = build_windows(&readings, &WindowSpec::new(1, 2.0, 0.0), end());
        let json = serde_json::to_value(&windows[0]).unwrap();
        assert_eq!(json["window_index"], 0);
        assert_eq!(json["window_label"], "Window 1");
        assert_eq!(json["hr_avg"], 72.0);
        assert_eq!(json["hr_values"], serde_json::json!([70.0, 74.0]));
        assert!(json.get("oxygen_avg").is_none());

        let back: TimeWindow = serde_json::from_value(json).unwrap();
        assert_eq!(back, windows[0]);
    }
}
