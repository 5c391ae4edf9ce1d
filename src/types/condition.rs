//! Health conditions and their baseline multiplier table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::VitalSign;

/// Simulated health condition applied to a patient's baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCondition {
    #[default]
    Healthy,
    Tachycardia,
    Bradycardia,
    Hypertension,
    Hypotension,
    Hypoxia,
    Hyperglycemia,
    Hypoglycemia,
    Sedentary,
    Athlete,
}

/// Per-signal multipliers, applied once to the baseline at profile construction.
const TACHYCARDIA: &[(VitalSign, f64)] = &[(VitalSign::HeartRate, 1.3)];
const BRADYCARDIA: &[(VitalSign, f64)] = &[(VitalSign::HeartRate, 0.7)];
const HYPERTENSION: &[(VitalSign, f64)] =
    &[(VitalSign::SystolicBp, 1.2), (VitalSign::DiastolicBp, 1.2)];
const HYPOTENSION: &[(VitalSign, f64)] =
    &[(VitalSign::SystolicBp, 0.85), (VitalSign::DiastolicBp, 0.85)];
const HYPOXIA: &[(VitalSign, f64)] = &[(VitalSign::Oxygen, 0.9)];
const HYPERGLYCEMIA: &[(VitalSign, f64)] = &[(VitalSign::Glucose, 1.5)];
const HYPOGLYCEMIA: &[(VitalSign, f64)] = &[(VitalSign::Glucose, 0.7)];
const SEDENTARY: &[(VitalSign, f64)] = &[(VitalSign::Activity, 0.5)];
const ATHLETE: &[(VitalSign, f64)] = &[(VitalSign::Activity, 1.3)];

impl HealthCondition {
    pub const ALL: [HealthCondition; 10] = [
        HealthCondition::Healthy,
        HealthCondition::Tachycardia,
        HealthCondition::Bradycardia,
        HealthCondition::Hypertension,
        HealthCondition::Hypotension,
        HealthCondition::Hypoxia,
        HealthCondition::Hyperglycemia,
        HealthCondition::Hypoglycemia,
        HealthCondition::Sedentary,
        HealthCondition::Athlete,
    ];

    /// Read-only baseline multiplier table for this condition.
    pub const fn multipliers(self) -> &'static [(VitalSign, f64)] {
        match self {
            HealthCondition::Healthy => &[],
            HealthCondition::Tachycardia => TACHYCARDIA,
            HealthCondition::Bradycardia => BRADYCARDIA,
            HealthCondition::Hypertension => HYPERTENSION,
            HealthCondition::Hypotension => HYPOTENSION,
            HealthCondition::Hypoxia => HYPOXIA,
            HealthCondition::Hyperglycemia => HYPERGLYCEMIA,
            HealthCondition::Hypoglycemia => HYPOGLYCEMIA,
            HealthCondition::Sedentary => SEDENTARY,
            HealthCondition::Athlete => ATHLETE,
        }
    }

    /// Multiplier for one signal (1.0 when the condition leaves it alone).
    pub fn multiplier(self, sign: VitalSign) -> f64 {
        self.multipliers()
            .iter()
            .find(|(s, _)| *s == sign)
            .map_or(1.0, |(_, factor)| *factor)
    }

    pub const fn name(self) -> &'static str {
        match self {
            HealthCondition::Healthy => "healthy",
            HealthCondition::Tachycardia => "tachycardia",
            HealthCondition::Bradycardia => "bradycardia",
            HealthCondition::Hypertension => "hypertension",
            HealthCondition::Hypotension => "hypotension",
            HealthCondition::Hypoxia => "hypoxia",
            HealthCondition::Hyperglycemia => "hyperglycemia",
            HealthCondition::Hypoglycemia => "hypoglycemia",
            HealthCondition::Sedentary => "sedentary",
            HealthCondition::Athlete => "athlete",
        }
    }
}

impl fmt::Display for HealthCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown health condition '{0}'")]
pub struct UnknownCondition(pub String);

impl FromStr for HealthCondition {
    type Err = UnknownCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("normal") {
            return Ok(HealthCondition::Healthy);
        }
        HealthCondition::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCondition(s.to_string()))
    }
}
