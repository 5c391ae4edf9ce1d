//! Prompt construction for the LLM path
//!
//! Raw series are never sent whole: each signal contributes at most
//! `PROMPT_MAX_POINTS` evenly strided points plus its min/max/avg, and trend
//! windows contribute statistics only.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

use super::windows::{SignalStats, TimeWindow};
use crate::config::defaults::{PROMPT_MAX_EVENTS, PROMPT_MAX_POINTS};
use crate::types::{hours, AnalysisKind, PatientData, Reading, VitalSign};

const TIME_WINDOW_INSTRUCTIONS: &str = "Analyze the patient's vital signs over the specified time window. \
Identify any patterns, trends, or anomalies. \
Provide clinical insights and recommendations based on the data.";

const EVENT_BASED_INSTRUCTIONS: &str = "Analyze the patient's vital signs around anomalous events. \
Focus on the context before and after anomalies. \
Identify potential causes and effects of the anomalies.";

const COMPARATIVE_INSTRUCTIONS: &str = "Compare the patient's vital signs in this period with a previous period. \
Identify any significant changes or trends between the periods. \
Assess whether the patient's condition is improving, stable, or deteriorating.";

const TREND_INSTRUCTIONS: &str = "Analyze trends across multiple time windows to identify patterns and changes over time. \
Evaluate progression or regression in vital signs across the windows. \
Identify any correlations between different measurements. \
Assess the overall trend direction and provide insights on the patient's health trajectory.";

const RESPONSE_SHAPE: &str = r#"

Please provide your analysis in JSON format with the following structure:
{
  "summary": "Overall assessment of the patient's condition",
  "insights": [
    {"text": "Specific insight about the data", "confidence": 0.9, "related_measurements": ["hr", "activity"]},
    ...
  ],
  "recommendations": [
    {"text": "Clinical recommendation", "priority": 3, "rationale": "Reason for this recommendation"},
    ...
  ]
}"#;

pub fn instructions(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::TimeWindow => TIME_WINDOW_INSTRUCTIONS,
        AnalysisKind::EventBased => EVENT_BASED_INSTRUCTIONS,
        AnalysisKind::Comparative => COMPARATIVE_INSTRUCTIONS,
        AnalysisKind::TrendAnalysis => TREND_INSTRUCTIONS,
    }
}

/// Full user prompt for `kind` over `data`.
pub fn build_prompt(kind: AnalysisKind, data: &PatientData) -> String {
    let mut p = String::with_capacity(4096);

    let _ = writeln!(p, "Patient ID: {}", data.patient_id);
    let _ = writeln!(p, "Time Period: {} to {}", iso(data.start_time), iso(data.end_time));
    let _ = writeln!(p, "Analysis Type: {}", kind);
    p.push('\n');

    p.push_str("Vital Signs Data:\n");
    for (sign, readings) in group_by_signal(&data.readings) {
        let _ = writeln!(p, "\n{}:", sign.key().to_uppercase());
        for r in sampled(&readings) {
            let flag = if r.is_anomaly { " (ANOMALY)" } else { "" };
            let _ = writeln!(p, "  {}: {}{}", iso(r.timestamp), py_float(r.value), flag);
        }
        if let Some(s) = stats_of(&readings) {
            let _ = writeln!(p, "  Summary: Min={:.1}, Max={:.1}, Avg={:.1}", s.min, s.max, s.avg);
        }
    }

    p.push_str("\nAnalysis Instructions:\n");
    p.push_str(instructions(kind));

    match kind {
        AnalysisKind::TrendAnalysis => push_windows(&mut p, data),
        AnalysisKind::Comparative => push_comparison(&mut p, data),
        AnalysisKind::EventBased => push_events(&mut p, data),
        AnalysisKind::TimeWindow => {}
    }

    p.push_str(RESPONSE_SHAPE);
    p
}

fn push_windows(p: &mut String, data: &PatientData) {
    let Some(windows) = data.windows.as_deref().filter(|w| !w.is_empty()) else {
        return;
    };
    p.push_str("\n\nMultiple Time Windows Data:\n");
    if let Some(spec) = &data.window_spec {
        let _ = writeln!(p, "Window Count: {}", spec.window_count);
        let _ = writeln!(p, "Window Duration: {} hours", py_float(spec.window_duration_hours));
        let _ = writeln!(p, "Window Interval: {} hours", py_float(spec.window_interval_hours));
    } else {
        let _ = writeln!(p, "Window Count: {}", windows.len());
    }
    p.push('\n');

    for w in windows {
        push_window(p, w);
    }
}

fn push_window(p: &mut String, w: &TimeWindow) {
    let _ = writeln!(p, "{}: {} to {}", w.label(), iso(w.start), iso(w.end));
    for (sign, s) in &w.stats {
        let _ = writeln!(
            p,
            "  {}: Min={:.1}, Max={:.1}, Avg={:.1}",
            sign.key().to_uppercase(),
            s.min,
            s.max,
            s.avg
        );
    }
    p.push('\n');
}

fn push_comparison(p: &mut String, data: &PatientData) {
    let Some(cmp) = &data.comparison else {
        return;
    };
    let _ = write!(
        p,
        "\n\nComparison Period: {} to {}\n",
        iso(cmp.start_time),
        iso(cmp.end_time)
    );
    let grouped = group_by_signal(&cmp.readings);
    if grouped.is_empty() {
        p.push_str("  No readings in the comparison period\n");
    }
    for (sign, readings) in grouped {
        if let Some(s) = stats_of(&readings) {
            let _ = writeln!(
                p,
                "  {}: Min={:.1}, Max={:.1}, Avg={:.1} ({} readings)",
                sign.key().to_uppercase(),
                s.min,
                s.max,
                s.avg,
                s.count()
            );
        }
    }
}

fn push_events(p: &mut String, data: &PatientData) {
    let minutes = data.context_window_minutes.unwrap_or(30.0);
    let _ = write!(
        p,
        "\n\nAnomalous Events (context window: {} minutes):\n",
        py_float(minutes)
    );

    let events: Vec<&Reading> = data
        .readings
        .iter()
        .filter(|r| r.is_anomaly)
        .take(PROMPT_MAX_EVENTS)
        .collect();
    if events.is_empty() {
        p.push_str("  No anomalous readings in this period\n");
        return;
    }

    let context = hours(minutes / 60.0);
    for (i, event) in events.iter().enumerate() {
        let _ = writeln!(
            p,
            "Event {}: {}={} at {}",
            i + 1,
            sign_label(event.signal),
            py_float(event.value),
            iso(event.timestamp)
        );
        let around: Vec<Reading> = in_context(&data.readings, event.timestamp, context);
        for (sign, readings) in group_by_signal(&around) {
            if let Some(s) = stats_of(&readings) {
                let _ = writeln!(
                    p,
                    "  {}: Min={:.1}, Max={:.1}, Avg={:.1}",
                    sign.key().to_uppercase(),
                    s.min,
                    s.max,
                    s.avg
                );
            }
        }
    }
}

fn in_context(readings: &[Reading], at: DateTime<Utc>, context: Duration) -> Vec<Reading> {
    readings
        .iter()
        .filter(|r| (r.timestamp - at).abs() <= context)
        .cloned()
        .collect()
}

fn sign_label(sign: VitalSign) -> String {
    sign.key().to_uppercase()
}

/// Readings grouped per signal in canonical order, each sorted by time.
fn group_by_signal(readings: &[Reading]) -> BTreeMap<VitalSign, Vec<Reading>> {
    let mut grouped: BTreeMap<VitalSign, Vec<Reading>> = BTreeMap::new();
    for r in readings {
        grouped.entry(r.signal).or_default().push(r.clone());
    }
    for list in grouped.values_mut() {
        list.sort_by_key(|r| r.timestamp);
    }
    grouped
}

/// Every `ceil(n / PROMPT_MAX_POINTS)`-th reading, so at most `PROMPT_MAX_POINTS`.
fn sampled(readings: &[Reading]) -> impl Iterator<Item = &Reading> {
    let stride = readings.len().div_ceil(PROMPT_MAX_POINTS).max(1);
    readings.iter().step_by(stride)
}

fn stats_of(readings: &[Reading]) -> Option<SignalStats> {
    SignalStats::from_values(readings.iter().map(|r| r.value).collect())
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Float text with a trailing `.0` for whole numbers (`72.0`, `97.4`, `0.35`).
fn py_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}
