//! Vital sign identifiers, normal ranges and rounding rules

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six signal channels a simulated wearable reports.
///
/// Variant order is the canonical channel order used for maps, prompts and
/// fallback insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VitalSign {
    /// Heart rate (bpm)
    #[serde(rename = "hr")]
    HeartRate,
    /// Systolic blood pressure (mmHg)
    #[serde(rename = "bp_sys")]
    SystolicBp,
    /// Diastolic blood pressure (mmHg)
    #[serde(rename = "bp_dia")]
    DiastolicBp,
    /// Oxygen saturation (%)
    #[serde(rename = "oxygen")]
    Oxygen,
    /// Blood glucose (mg/dL)
    #[serde(rename = "glucose")]
    Glucose,
    /// Activity level (0-1)
    #[serde(rename = "activity")]
    Activity,
}

impl VitalSign {
    pub const ALL: [VitalSign; 6] = [
        VitalSign::HeartRate,
        VitalSign::SystolicBp,
        VitalSign::DiastolicBp,
        VitalSign::Oxygen,
        VitalSign::Glucose,
        VitalSign::Activity,
    ];

    /// Wire key used in samples, window maps and prompts.
    pub const fn key(self) -> &'static str {
        match self {
            VitalSign::HeartRate => "hr",
            VitalSign::SystolicBp => "bp_sys",
            VitalSign::DiastolicBp => "bp_dia",
            VitalSign::Oxygen => "oxygen",
            VitalSign::Glucose => "glucose",
            VitalSign::Activity => "activity",
        }
    }

    /// Stable position in [`VitalSign::ALL`], used for fixed-size per-signal arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Canonical normal range `(min, max)`.
    pub const fn normal_range(self) -> (f64, f64) {
        match self {
            VitalSign::HeartRate => (60.0, 100.0),
            VitalSign::SystolicBp => (100.0, 140.0),
            VitalSign::DiastolicBp => (60.0, 90.0),
            VitalSign::Oxygen => (95.0, 100.0),
            VitalSign::Glucose => (70.0, 120.0),
            VitalSign::Activity => (0.3, 0.7),
        }
    }

    /// Range outside of which an ingested reading is flagged as anomalous.
    ///
    /// Identical to the normal range except activity, where any value in
    /// the physical 0-1 scale is accepted.
    pub const fn anomaly_range(self) -> (f64, f64) {
        match self {
            VitalSign::Activity => (0.0, 1.0),
            other => other.normal_range(),
        }
    }

    pub fn range_width(self) -> f64 {
        let (min, max) = self.normal_range();
        max - min
    }

    /// `[min - f*range, max + f*range]` around the normal range.
    pub fn widened_bounds(self, fraction: f64) -> (f64, f64) {
        let (min, max) = self.normal_range();
        let width = max - min;
        (min - fraction * width, max + fraction * width)
    }

    /// Round to the signal's reporting precision.
    ///
    /// HR, BP and glucose are integers, oxygen has one decimal, activity has
    /// two decimals and is clamped to [0, 1].
    pub fn round(self, value: f64) -> f64 {
        match self {
            VitalSign::HeartRate
            | VitalSign::SystolicBp
            | VitalSign::DiastolicBp
            | VitalSign::Glucose => value.round(),
            VitalSign::Oxygen => round_to(value, 1),
            VitalSign::Activity => round_to(value, 2).clamp(0.0, 1.0),
        }
    }

    pub fn is_anomalous(self, value: f64) -> bool {
        let (min, max) = self.anomaly_range();
        value < min || value > max
    }

    /// Human label with units, used in log lines.
    pub const fn label(self) -> &'static str {
        match self {
            VitalSign::HeartRate => "heart rate (bpm)",
            VitalSign::SystolicBp => "systolic BP (mmHg)",
            VitalSign::DiastolicBp => "diastolic BP (mmHg)",
            VitalSign::Oxygen => "oxygen saturation (%)",
            VitalSign::Glucose => "glucose (mg/dL)",
            VitalSign::Activity => "activity level",
        }
    }
}

impl fmt::Display for VitalSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error for an unrecognised signal key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown vital sign '{0}'")]
pub struct UnknownVitalSign(pub String);

impl FromStr for VitalSign {
    type Err = UnknownVitalSign;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VitalSign::ALL
            .into_iter()
            .find(|v| v.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVitalSign(s.to_string()))
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
