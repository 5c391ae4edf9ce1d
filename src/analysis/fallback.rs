//! Deterministic analysis used when no LLM answer is available
//!
//! Pure functions over already-fetched data: same input, same output.

use std::collections::BTreeMap;

use super::windows::{trend_windows_from_range, TimeWindow};
use super::Narrative;
use crate::config::defaults::{
    TREND_ACTIVITY_DROP_PERCENT, TREND_HR_RISE_PERCENT, TREND_OXYGEN_DROP_PERCENT,
    TREND_SIGNIFICANCE_PERCENT,
};
use crate::types::{
    AnalysisKind, AnalysisResult, GeneratedBy, Insight, PatientData, Reading, Recommendation,
    VitalSign, WindowSpec,
};

/// Layout assumed when a trend analysis carries no window parameters.
const DEFAULT_TREND_SPEC: WindowSpec = WindowSpec {
    window_count: 5,
    window_duration_hours: 6.0,
    window_interval_hours: 0.0,
};

/// Full fallback result for `kind`.
///
/// Trend analyses use the request's windows when present; otherwise windows
/// are laid out forward from the data range start.
pub fn fallback_analysis(kind: AnalysisKind, data: &PatientData) -> AnalysisResult {
    let (narrative, windows) = match kind {
        AnalysisKind::TrendAnalysis => {
            let spec = data.window_spec.unwrap_or(DEFAULT_TREND_SPEC);
            let windows = match &data.windows {
                Some(w) => w.clone(),
                None => trend_windows_from_range(&data.readings, &spec, data.start_time, data.end_time),
            };
            (trend_narrative(&windows, Some(&spec)), Some(windows))
        }
        _ => (snapshot_narrative(&data.readings), None),
    };

    AnalysisResult {
        patient_id: data.patient_id.clone(),
        analysis_type: kind,
        summary: narrative.summary,
        insights: narrative.insights,
        recommendations: narrative.recommendations,
        data_points_analyzed: data.readings.len(),
        time_period: data.time_period(),
        windows,
        generated_by: GeneratedBy::Fallback,
    }
}

/// Per-window averages of one signal, in window order, skipping windows without it.
pub fn window_averages(windows: &[TimeWindow], sign: VitalSign) -> Vec<f64> {
    windows
        .iter()
        .filter_map(|w| w.get(sign).map(|s| s.avg))
        .collect()
}

/// `(last - first) / first * 100`; 0 when the first average is 0.
pub fn percent_change(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        0.0
    } else {
        (last - first) / first * 100.0
    }
}

// ============================================================================
// Trend
// ============================================================================

/// Classify each signal's first-to-last window change.
pub fn trend_narrative(windows: &[TimeWindow], spec: Option<&WindowSpec>) -> Narrative {
    let mut insights = Vec::new();
    let mut recommendations = Vec::new();

    let averages: BTreeMap<VitalSign, Vec<f64>> = VitalSign::ALL
        .into_iter()
        .map(|sign| (sign, window_averages(windows, sign)))
        .filter(|(_, avgs)| !avgs.is_empty())
        .collect();

    for (&sign, avgs) in &averages {
        let (Some(&first), Some(&last)) = (avgs.first(), avgs.last()) else {
            continue;
        };
        if avgs.len() < 2 {
            continue;
        }
        let pc = percent_change(first, last);
        let key = sign.key().to_uppercase();

        if pc.abs() > TREND_SIGNIFICANCE_PERCENT {
            let direction = if pc > 0.0 { "increasing" } else { "decreasing" };
            insights.push(Insight::new(
                format!("{key} shows a {direction} trend of {:.1}% across windows", pc.abs()),
                0.85,
                vec![sign],
            ));
            if let Some(rec) = trend_recommendation(sign, pc) {
                recommendations.push(rec);
            }
        } else {
            insights.push(Insight::new(
                format!("{key} remains relatively stable across windows (change: {pc:.1}%)"),
                0.9,
                vec![sign],
            ));
        }
    }

    if averages.len() > 1 {
        insights.push(Insight::new(
            format!("Analysis of {} time windows shows multiple vital sign patterns", windows.len()),
            0.8,
            averages.keys().copied().collect(),
        ));
        recommendations.push(Recommendation::new(
            "Continue monitoring with the current window configuration",
            2,
            "Multiple time windows provide good trend visibility",
        ));
    }

    let summary = if insights.is_empty() {
        format!("Trend analysis across {} windows shows no significant patterns.", windows.len())
    } else {
        let span = spec.map_or(0.0, WindowSpec::total_span_hours);
        format!(
            "Trend analysis across {} windows spanning {:.1} hours shows {} notable patterns.",
            windows.len(),
            span,
            insights.len()
        )
    };

    Narrative {
        summary,
        insights,
        recommendations,
    }
}

fn trend_recommendation(sign: VitalSign, pc: f64) -> Option<Recommendation> {
    match sign {
        VitalSign::HeartRate if pc > TREND_HR_RISE_PERCENT => Some(Recommendation::new(
            "Monitor heart rate more frequently",
            3,
            format!("Increasing heart rate trend of {pc:.1}%"),
        )),
        VitalSign::Oxygen if pc < TREND_OXYGEN_DROP_PERCENT => Some(Recommendation::new(
            "Evaluate respiratory function",
            4,
            format!("Decreasing oxygen saturation trend of {:.1}%", pc.abs()),
        )),
        VitalSign::Activity if pc < TREND_ACTIVITY_DROP_PERCENT => Some(Recommendation::new(
            "Assess for mobility issues or fatigue",
            3,
            format!("Decreasing activity level trend of {:.1}%", pc.abs()),
        )),
        _ => None,
    }
}

// ============================================================================
// Snapshot (time window, event based, comparative)
// ============================================================================

/// Heart-rate average and oxygen minimum checks over the whole reading set.
pub fn snapshot_narrative(readings: &[Reading]) -> Narrative {
    let mut by_signal: BTreeMap<VitalSign, Vec<f64>> = BTreeMap::new();
    for r in readings {
        by_signal.entry(r.signal).or_default().push(r.value);
    }

    let mut insights = Vec::new();
    let mut recommendations = Vec::new();

    if let Some(hr) = by_signal.get(&VitalSign::HeartRate).filter(|v| !v.is_empty()) {
        let avg = hr.iter().sum::<f64>() / hr.len() as f64;
        if avg > 100.0 {
            insights.push(Insight::new(
                format!("Elevated average heart rate ({avg:.1} bpm)"),
                0.8,
                vec![VitalSign::HeartRate],
            ));
            recommendations.push(Recommendation::new(
                "Monitor heart rate closely",
                3,
                "Elevated average heart rate",
            ));
        } else if avg < 60.0 {
            insights.push(Insight::new(
                format!("Low average heart rate ({avg:.1} bpm)"),
                0.8,
                vec![VitalSign::HeartRate],
            ));
            recommendations.push(Recommendation::new(
                "Evaluate for bradycardia",
                3,
                "Low average heart rate",
            ));
        } else {
            insights.push(Insight::new(
                format!("Normal average heart rate ({avg:.1} bpm)"),
                0.9,
                vec![VitalSign::HeartRate],
            ));
        }
    }

    if let Some(o2) = by_signal.get(&VitalSign::Oxygen).filter(|v| !v.is_empty()) {
        let min = o2.iter().copied().fold(f64::INFINITY, f64::min);
        if min < 95.0 {
            insights.push(Insight::new(
                format!("Low oxygen saturation detected (minimum {min:.1}%)"),
                0.9,
                vec![VitalSign::Oxygen],
            ));
            recommendations.push(Recommendation::new(
                "Evaluate respiratory status",
                4,
                "Low oxygen saturation",
            ));
        }
    }

    if insights.is_empty() {
        let present: Vec<VitalSign> = by_signal.keys().copied().collect();
        insights.push(Insight::new(
            "All vital signs appear to be within normal ranges",
            0.8,
            present.clone(),
        ));
        insights.push(Insight::new(
            "Patient shows stable health metrics during the monitoring period",
            0.7,
            present,
        ));
        recommendations.push(Recommendation::new(
            "Continue regular monitoring schedule",
            1,
            "Maintaining vigilance despite normal readings",
        ));
        recommendations.push(Recommendation::new(
            "Review patient's medication adherence at next check-up",
            2,
            "Ensure continued stability of vital signs",
        ));
    }

    let summary = match insights.as_slice() {
        [only] => only.text.clone(),
        [] => "No significant patterns detected in patient vital signs.".to_string(),
        _ => "Multiple observations in patient vital signs. See insights for details.".to_string(),
    };

    Narrative {
        summary,
        insights,
        recommendations,
    }
}
