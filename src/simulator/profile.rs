//! Per-patient simulation state: baselines, trends and the RNG that drives them

use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::config::defaults::{OXYGEN_BASELINE_CENTER, TREND_DECAY};
use crate::types::{HealthCondition, VitalSign};

/// A patient being simulated.
///
/// Baselines are fixed at construction (midpoint of the normal range, oxygen
/// at 98 +/- 1, then scaled once by the condition). Trends evolve every tick.
#[derive(Debug, Clone)]
pub struct PatientProfile {
    pub patient_id: String,
    pub condition: HealthCondition,
    baselines: [f64; 6],
    trends: [f64; 6],
    rng: StdRng,
}

impl PatientProfile {
    pub fn new(patient_id: impl Into<String>, condition: HealthCondition, seed: Option<u64>) -> Self {
        Self::with_rng(patient_id, condition, seeded_rng(seed))
    }

    pub fn with_rng(patient_id: impl Into<String>, condition: HealthCondition, mut rng: StdRng) -> Self {
        let mut baselines = [0.0; 6];
        for sign in VitalSign::ALL {
            let (min, max) = sign.normal_range();
            let base = match sign {
                VitalSign::Oxygen => OXYGEN_BASELINE_CENTER + rng.gen_range(-1.0..=1.0),
                _ => (min + max) / 2.0,
            };
            baselines[sign.index()] = base * condition.multiplier(sign);
        }

        Self {
            patient_id: patient_id.into(),
            condition,
            baselines,
            trends: [0.0; 6],
            rng,
        }
    }

    pub fn baseline(&self, sign: VitalSign) -> f64 {
        self.baselines[sign.index()]
    }

    pub fn trend(&self, sign: VitalSign) -> f64 {
        self.trends[sign.index()]
    }

    /// Damped random walk: `t = decay * (t + N(0, sigma))`.
    pub fn step_trend(&mut self, sign: VitalSign, sigma: f64) -> f64 {
        let step = self.normal(sigma);
        let t = &mut self.trends[sign.index()];
        *t = (*t + step) * TREND_DECAY;
        *t
    }

    /// Draw from `N(0, sigma)`.
    pub fn normal(&mut self, sigma: f64) -> f64 {
        draw_normal(&mut self.rng, sigma)
    }
}

/// Fixed seed for reproducible runs, entropy otherwise.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

pub(crate) fn draw_normal(rng: &mut StdRng, sigma: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    z * sigma
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baselines_start_at_midpoints() {
        let p = PatientProfile::new("p", HealthCondition::Healthy, Some(1));
        assert_eq!(p.baseline(VitalSign::HeartRate), 80.0);
        assert_eq!(p.baseline(VitalSign::SystolicBp), 120.0);
        assert_eq!(p.baseline(VitalSign::Glucose), 95.0);
        assert_eq!(p.baseline(VitalSign::Activity), 0.5);
        let o2 = p.baseline(VitalSign::Oxygen);
        assert!((97.0..=99.0).contains(&o2));
    }

    #[test]
    fn test_condition_applied_once() {
        let p = PatientProfile::new("p", HealthCondition::Tachycardia, Some(1));
        assert!((p.baseline(VitalSign::HeartRate) - 104.0).abs() < 1e-9);
        assert_eq!(p.baseline(VitalSign::Glucose), 95.0);
    }

    #[test]
    fn test_same_seed_same_walk() {
        let mut a = PatientProfile::new("p", HealthCondition::Healthy, Some(7));
        let mut b = PatientProfile::new("p", HealthCondition::Healthy, Some(7));
        for _ in 0..50 {
            assert_eq!(
                a.step_trend(VitalSign::HeartRate, 0.05),
                b.step_trend(VitalSign::HeartRate, 0.05)
            );
        }
    }

    #[test]
    fn test_trend_stays_small() {
        let mut p = PatientProfile::new("p", HealthCondition::Healthy, Some(3));
        let mut max_abs: f64 = 0.0;
        for _ in 0..10_000 {
            max_abs = max_abs.max(p.step_trend(VitalSign::Glucose, 0.05).abs());
        }
        // stationary std-dev is ~0.15; 10 sigma is far outside reach
        assert!(max_abs < 1.5, "trend wandered to {max_abs}");
    }
}
