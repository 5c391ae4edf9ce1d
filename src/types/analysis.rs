//! Analysis requests and results

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Reading, VitalSign};
use crate::analysis::TimeWindow;
use crate::config::defaults::MAX_SPAN_HOURS;

// ============================================================================
// Analysis Kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    TimeWindow,
    EventBased,
    Comparative,
    TrendAnalysis,
}

impl AnalysisKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::TimeWindow => "time_window",
            AnalysisKind::EventBased => "event_based",
            AnalysisKind::Comparative => "comparative",
            AnalysisKind::TrendAnalysis => "trend_analysis",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "time_window" => Ok(AnalysisKind::TimeWindow),
            "event_based" => Ok(AnalysisKind::EventBased),
            "comparative" => Ok(AnalysisKind::Comparative),
            "trend_analysis" | "trend" => Ok(AnalysisKind::TrendAnalysis),
            other => Err(format!("unknown analysis kind '{other}'")),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Window layout for a trend analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub window_count: usize,
    pub window_duration_hours: f64,
    #[serde(default)]
    pub window_interval_hours: f64,
}

impl WindowSpec {
    pub fn new(window_count: usize, window_duration_hours: f64, window_interval_hours: f64) -> Self {
        Self {
            window_count,
            window_duration_hours,
            window_interval_hours,
        }
    }

    /// `n*d + (n-1)*g`, in hours.
    pub fn total_span_hours(&self) -> f64 {
        let n = self.window_count as f64;
        n * self.window_duration_hours + (n - 1.0).max(0.0) * self.window_interval_hours
    }

    /// Start of the first window when the last one ends at `end`.
    pub fn calculated_start(&self, end: DateTime<Utc>) -> DateTime<Utc> {
        end.checked_sub_signed(hours(self.total_span_hours()))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub(crate) fn validate(&self, errors: &mut Vec<String>) {
        if self.window_count == 0 {
            errors.push("window_count must be >= 1".to_string());
        }
        if !self.window_duration_hours.is_finite() || self.window_duration_hours <= 0.0 {
            errors.push(format!(
                "window_duration_hours must be a finite value > 0 (got {})",
                self.window_duration_hours
            ));
        }
        if !self.window_interval_hours.is_finite() || self.window_interval_hours < 0.0 {
            errors.push(format!(
                "window_interval_hours must be a finite value >= 0 (got {})",
                self.window_interval_hours
            ));
        }
        if self.total_span_hours() > MAX_SPAN_HOURS {
            errors.push(format!(
                "total window span of {:.1} hours exceeds the {MAX_SPAN_HOURS} hour limit",
                self.total_span_hours()
            ));
        }
    }
}

/// Kind-specific request parameters. The variant fixes the analysis kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis_type", rename_all = "snake_case")]
pub enum AnalysisParams {
    TimeWindow,
    EventBased {
        #[serde(default = "default_event_type")]
        event_type: String,
        #[serde(default = "default_context_window")]
        context_window_minutes: f64,
    },
    Comparative {
        comparison_start_time: DateTime<Utc>,
        comparison_end_time: DateTime<Utc>,
    },
    TrendAnalysis(WindowSpec),
}

fn default_event_type() -> String {
    "anomaly".to_string()
}

fn default_context_window() -> f64 {
    30.0
}

impl AnalysisParams {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisParams::TimeWindow => AnalysisKind::TimeWindow,
            AnalysisParams::EventBased { .. } => AnalysisKind::EventBased,
            AnalysisParams::Comparative { .. } => AnalysisKind::Comparative,
            AnalysisParams::TrendAnalysis(_) => AnalysisKind::TrendAnalysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub patient_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Restrict to these signals; `None` means all.
    #[serde(default, rename = "measurement_types")]
    pub signals: Option<Vec<VitalSign>>,
    #[serde(flatten)]
    pub params: AnalysisParams,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid analysis request: {}", .0.join("; "))]
pub struct InvalidRequest(pub Vec<String>);

impl AnalysisRequest {
    pub fn time_window(
        patient_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            start_time,
            end_time,
            signals: None,
            params: AnalysisParams::TimeWindow,
        }
    }

    /// Trend request ending at `end_time`; the start is derived from the window layout.
    pub fn trend(patient_id: impl Into<String>, end_time: DateTime<Utc>, spec: WindowSpec) -> Self {
        let start_time = spec.calculated_start(end_time);
        Self {
            patient_id: patient_id.into(),
            start_time,
            end_time,
            signals: None,
            params: AnalysisParams::TrendAnalysis(spec),
        }
    }

    pub fn with_params(mut self, params: AnalysisParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_signals(mut self, signals: Vec<VitalSign>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn kind(&self) -> AnalysisKind {
        self.params.kind()
    }

    /// Range whose readings count as `data_points_analyzed`.
    ///
    /// For trend analysis this is `[calculated_start, end]`, otherwise the
    /// request's own range.
    pub fn primary_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match &self.params {
            AnalysisParams::TrendAnalysis(spec) => (spec.calculated_start(self.end_time), self.end_time),
            _ => (self.start_time, self.end_time),
        }
    }

    /// Check every parameter and report all problems at once.
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        let mut errors = Vec::new();

        if self.patient_id.trim().is_empty() {
            errors.push("patient_id must not be empty".to_string());
        }
        if let Some(signals) = &self.signals {
            if signals.is_empty() {
                errors.push("measurement_types must not be empty when given".to_string());
            }
        }

        match &self.params {
            AnalysisParams::TrendAnalysis(spec) => spec.validate(&mut errors),
            AnalysisParams::Comparative {
                comparison_start_time,
                comparison_end_time,
            } => {
                self.check_range(&mut errors);
                if comparison_start_time >= comparison_end_time {
                    errors.push(format!(
                        "comparison_start_time ({comparison_start_time}) must be before comparison_end_time ({comparison_end_time})"
                    ));
                }
            }
            AnalysisParams::EventBased {
                context_window_minutes,
                ..
            } => {
                self.check_range(&mut errors);
                if !context_window_minutes.is_finite() || *context_window_minutes <= 0.0 {
                    errors.push(format!(
                        "context_window_minutes must be a finite value > 0 (got {context_window_minutes})"
                    ));
                }
            }
            AnalysisParams::TimeWindow => self.check_range(&mut errors),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(InvalidRequest(errors))
        }
    }

    fn check_range(&self, errors: &mut Vec<String>) {
        if self.start_time >= self.end_time {
            errors.push(format!(
                "start_time ({}) must be before end_time ({})",
                self.start_time, self.end_time
            ));
        }
    }
}

/// Fractional hours as a chrono duration, millisecond resolution.
pub fn hours(h: f64) -> Duration {
    let ms = (h * 3_600_000.0).round().clamp(-1e15, 1e15);
    Duration::milliseconds(ms as i64)
}

// ============================================================================
// Patient Data
// ============================================================================

/// Everything an analysis path needs: the primary readings plus the
/// kind-specific extras fetched for the request.
#[derive(Debug, Clone)]
pub struct PatientData {
    pub patient_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub readings: Vec<Reading>,
    pub comparison: Option<ComparisonPeriod>,
    pub windows: Option<Vec<TimeWindow>>,
    pub window_spec: Option<WindowSpec>,
    pub context_window_minutes: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ComparisonPeriod {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub readings: Vec<Reading>,
}

impl PatientData {
    pub fn new(
        patient_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        readings: Vec<Reading>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            start_time,
            end_time,
            readings,
            comparison: None,
            windows: None,
            window_spec: None,
            context_window_minutes: None,
        }
    }

    /// `"{hours:.1} hours"` over the primary range.
    pub fn time_period(&self) -> String {
        let secs = (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0;
        format!("{:.1} hours", secs / 3600.0)
    }
}

// ============================================================================
// Result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, rename = "related_measurements")]
    pub related_signals: Vec<VitalSign>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Insight {
    pub fn new(text: impl Into<String>, confidence: f64, related_signals: Vec<VitalSign>) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            related_signals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub rationale: String,
}

fn default_priority() -> u8 {
    1
}

impl Recommendation {
    pub fn new(text: impl Into<String>, priority: u8, rationale: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: priority.clamp(1, 5),
            rationale: rationale.into(),
        }
    }
}

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedBy {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub patient_id: String,
    pub analysis_type: AnalysisKind,
    pub summary: String,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
    pub data_points_analyzed: usize,
    pub time_period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<Vec<TimeWindow>>,
    pub generated_by: GeneratedBy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 26, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_window_spec_span() {
        assert_eq!(WindowSpec::new(5, 6.0, 0.0).total_span_hours(), 30.0);
        assert_eq!(WindowSpec::new(3, 4.0, 2.0).total_span_hours(), 16.0);
        assert_eq!(WindowSpec::new(1, 4.0, 2.0).total_span_hours(), 4.0);
    }

    #[test]
    fn test_trend_primary_range() {
        let req = AnalysisRequest::trend("p", end(), WindowSpec::new(3, 4.0, 2.0));
        let (start, stop) = req.primary_range();
        assert_eq!(stop - start, Duration::hours(16));
        assert_eq!(req.kind(), AnalysisKind::TrendAnalysis);
    }

    #[test]
    fn test_validate_rejects_bad_windows() {
        let req = AnalysisRequest::trend("p", end(), WindowSpec::new(0, -1.0, f64::NAN));
        let err = req.validate().unwrap_err();
        assert_eq!(err.0.len(), 3);
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let req = AnalysisRequest::time_window("p", end(), end() - Duration::hours(1));
        assert!(req.validate().is_err());
        let ok = AnalysisRequest::time_window("p", end() - Duration::hours(1), end());
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "analysis_type": "event_based",
            "patient_id": "patient-1",
            "start_time": "2025-05-26T12:00:00Z",
            "end_time": "2025-05-26T18:00:00Z",
            "measurement_types": ["hr", "oxygen"]
        }"#;
        let req: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind(), AnalysisKind::EventBased);
        assert_eq!(req.signals.as_deref(), Some(&[VitalSign::HeartRate, VitalSign::Oxygen][..]));
        match req.params {
            AnalysisParams::EventBased { context_window_minutes, ref event_type } => {
                assert_eq!(context_window_minutes, 30.0);
                assert_eq!(event_type, "anomaly");
            }
            _ => panic!("wrong params"),
        }
    }

    #[test]
    fn test_time_period_format() {
        let data = PatientData::new("p", end() - Duration::minutes(90), end(), Vec::new());
        assert_eq!(data.time_period(), "1.5 hours");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("trend-analysis".parse::<AnalysisKind>().unwrap(), AnalysisKind::TrendAnalysis);
        assert!("weekly".parse::<AnalysisKind>().is_err());
    }
}
