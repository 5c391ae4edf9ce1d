//! Simple generator without time-of-day modulation
//!
//! Baselines drift with the trend (bounded to 20% of the range beyond each
//! edge) and noise is additive, scaled by the range width. Supports forcing
//! an abnormal condition mid-run.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use std::str::FromStr;

use super::profile::{draw_normal, seeded_rng};
use super::SampleSource;
use crate::config::defaults::{
    BASELINE_DRIFT_FRACTION, SIMPLE_TREND_SIGMA, TREND_DECAY, VALUE_BAND_FRACTION,
};
use crate::types::{HealthCondition, Sample, VitalSign};

/// Conditions that can be forced onto a running [`SimpleSignalGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbnormalCondition {
    Tachycardia,
    Hypoxia,
    Hypertension,
    Hypoglycemia,
    Hyperglycemia,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown condition type '{0}'")]
pub struct UnsupportedCondition(pub String);

impl FromStr for AbnormalCondition {
    type Err = UnsupportedCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tachycardia" => Ok(Self::Tachycardia),
            "hypoxia" => Ok(Self::Hypoxia),
            "hypertension" => Ok(Self::Hypertension),
            "hypoglycemia" => Ok(Self::Hypoglycemia),
            "hyperglycemia" => Ok(Self::Hyperglycemia),
            "normal" | "healthy" => Ok(Self::Normal),
            other => Err(UnsupportedCondition(other.to_string())),
        }
    }
}

impl TryFrom<HealthCondition> for AbnormalCondition {
    type Error = UnsupportedCondition;

    fn try_from(c: HealthCondition) -> Result<Self, Self::Error> {
        c.name().parse()
    }
}

#[derive(Debug, Clone)]
pub struct SimpleSignalGenerator {
    pub patient_id: String,
    pub device_id: String,
    rng: StdRng,
    baselines: [f64; 6],
    trends: [f64; 6],
    noise_level: f64,
    condition: HealthCondition,
}

impl SimpleSignalGenerator {
    /// All baselines start at the range midpoints, trends at zero.
    pub fn new(
        patient_id: impl Into<String>,
        device_id: impl Into<String>,
        noise_level: f64,
        seed: Option<u64>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            device_id: device_id.into(),
            rng: seeded_rng(seed),
            baselines: midpoints(),
            trends: [0.0; 6],
            noise_level,
            condition: HealthCondition::Healthy,
        }
    }

    pub fn baseline(&self, sign: VitalSign) -> f64 {
        self.baselines[sign.index()]
    }

    pub fn trend(&self, sign: VitalSign) -> f64 {
        self.trends[sign.index()]
    }

    pub fn generate_value(&mut self, sign: VitalSign) -> f64 {
        let i = sign.index();
        let (min, max) = sign.normal_range();
        let width = max - min;

        self.trends[i] = (self.trends[i] + draw_normal(&mut self.rng, SIMPLE_TREND_SIGMA)) * TREND_DECAY;

        let drift_lo = min - width * BASELINE_DRIFT_FRACTION;
        let drift_hi = max + width * BASELINE_DRIFT_FRACTION;
        self.baselines[i] = (self.baselines[i] + self.trends[i]).clamp(drift_lo, drift_hi);

        let value = self.baselines[i] + draw_normal(&mut self.rng, self.noise_level * width);
        let (lo, hi) = sign.widened_bounds(VALUE_BAND_FRACTION);
        sign.round(value.clamp(lo, hi))
    }

    pub fn generate_all(&mut self, ts: DateTime<Utc>) -> Sample {
        let mut sample = Sample::new(ts);
        for sign in VitalSign::ALL {
            let v = self.generate_value(sign);
            sample.values.insert(sign, v);
        }
        sample
    }

    /// Force an abnormal state: baseline jumps to a range edge times a factor
    /// and the trend is seeded in the direction of the condition.
    pub fn simulate_abnormal_condition(&mut self, condition: AbnormalCondition) {
        match condition {
            AbnormalCondition::Tachycardia => {
                self.force(VitalSign::HeartRate, 100.0 * 1.3, 2.0);
                self.condition = HealthCondition::Tachycardia;
            }
            AbnormalCondition::Hypoxia => {
                self.force(VitalSign::Oxygen, 95.0 * 0.9, -0.5);
                self.condition = HealthCondition::Hypoxia;
            }
            AbnormalCondition::Hypertension => {
                self.force(VitalSign::SystolicBp, 140.0 * 1.2, 2.0);
                self.force(VitalSign::DiastolicBp, 90.0 * 1.2, 1.0);
                self.condition = HealthCondition::Hypertension;
            }
            AbnormalCondition::Hypoglycemia => {
                self.force(VitalSign::Glucose, 70.0 * 0.7, -1.0);
                self.condition = HealthCondition::Hypoglycemia;
            }
            AbnormalCondition::Hyperglycemia => {
                self.force(VitalSign::Glucose, 120.0 * 1.5, 2.0);
                self.condition = HealthCondition::Hyperglycemia;
            }
            AbnormalCondition::Normal => {
                self.baselines = midpoints();
                self.trends = [0.0; 6];
                self.condition = HealthCondition::Healthy;
            }
        }
        tracing::debug!(device = %self.device_id, ?condition, "Abnormal condition applied");
    }

    fn force(&mut self, sign: VitalSign, baseline: f64, trend: f64) {
        self.baselines[sign.index()] = baseline;
        self.trends[sign.index()] = trend;
    }

    /// String form, rejecting anything but the supported conditions.
    pub fn simulate_condition_named(&mut self, name: &str) -> Result<(), UnsupportedCondition> {
        let condition = name.parse()?;
        self.simulate_abnormal_condition(condition);
        Ok(())
    }
}

fn midpoints() -> [f64; 6] {
    VitalSign::ALL.map(|s| {
        let (min, max) = s.normal_range();
        min + (max - min) * 0.5
    })
}

impl SampleSource for SimpleSignalGenerator {
    fn next_sample(&mut self, ts: DateTime<Utc>) -> Sample {
        self.generate_all(ts)
    }

    fn patient_id(&self) -> &str {
        &self.patient_id
    }

    fn condition(&self) -> HealthCondition {
        self.condition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn generator() -> SimpleSignalGenerator {
        SimpleSignalGenerator::new("p", "d", 0.02, Some(11))
    }

    #[test]
    fn test_starts_at_midpoints() {
        let g = generator();
        assert_eq!(g.baseline(VitalSign::HeartRate), 80.0);
        assert_eq!(g.baseline(VitalSign::Oxygen), 97.5);
        assert_eq!(g.trend(VitalSign::Glucose), 0.0);
    }

    #[test]
    fn test_seeded_runs_repeat_and_keep_ids() {
        let ts = Utc.with_ymd_and_hms(2025, 5, 26, 0, 0, 0).unwrap();
        let mut a = generator();
        let mut b = generator();
        for _ in 0..100 {
            assert_eq!(a.generate_all(ts), b.generate_all(ts));
        }
        assert_eq!(a.patient_id(), "p");
        assert_eq!(a.device_id, "d");
    }

    #[test]
    fn test_baseline_drift_is_bounded() {
        let mut g = generator();
        for _ in 0..5_000 {
            g.generate_value(VitalSign::HeartRate);
        }
        let b = g.baseline(VitalSign::HeartRate);
        assert!((52.0..=108.0).contains(&b), "baseline drifted to {b}");
    }

    #[test]
    fn test_values_stay_in_band() {
        let mut g = generator();
        let ts = Utc.with_ymd_and_hms(2025, 5, 26, 0, 0, 0).unwrap();
        for _ in 0..2_000 {
            let s = g.generate_all(ts);
            for (sign, v) in &s.values {
                let (lo, hi) = sign.widened_bounds(0.3);
                assert!(*v >= lo - 0.5 && *v <= hi + 0.5, "{sign} = {v}");
            }
        }
    }

    #[test]
    fn test_tachycardia_sets_baseline_and_trend() {
        let mut g = generator();
        g.simulate_abnormal_condition(AbnormalCondition::Tachycardia);
        assert!((g.baseline(VitalSign::HeartRate) - 130.0).abs() < 1e-9);
        assert_eq!(g.trend(VitalSign::HeartRate), 2.0);
        assert_eq!(g.condition(), HealthCondition::Tachycardia);
    }

    #[test]
    fn test_hypertension_sets_both_pressures() {
        let mut g = generator();
        g.simulate_abnormal_condition(AbnormalCondition::Hypertension);
        assert!((g.baseline(VitalSign::SystolicBp) - 168.0).abs() < 1e-9);
        assert!((g.baseline(VitalSign::DiastolicBp) - 108.0).abs() < 1e-9);
        assert_eq!(g.trend(VitalSign::DiastolicBp), 1.0);
    }

    #[test]
    fn test_normal_resets_everything() {
        let mut g = generator();
        g.simulate_abnormal_condition(AbnormalCondition::Hyperglycemia);
        g.simulate_abnormal_condition(AbnormalCondition::Normal);
        assert_eq!(g.baseline(VitalSign::Glucose), 95.0);
        assert_eq!(g.trend(VitalSign::Glucose), 0.0);
    }

    #[test]
    fn test_unknown_condition_is_rejected() {
        let mut g = generator();
        assert!(g.simulate_condition_named("bradycardia").is_err());
        assert!(g.simulate_condition_named("hypoxia").is_ok());
        assert!(AbnormalCondition::try_from(HealthCondition::Athlete).is_err());
    }
}
