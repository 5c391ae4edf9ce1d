//! Modulated signal model: baseline + trend + circadian/meal/sleep + noise

use chrono::{DateTime, Duration, Utc};

use super::{CircadianModulator, PatientProfile, SampleSource};
use crate::config::defaults::{
    OXYGEN_CEILING, OXYGEN_FLOOR, OXYGEN_NOISE_SIGMA, TREND_SIGMA, VALUE_BAND_FRACTION,
};
use crate::config::SmartCareConfig;
use crate::types::{round_to, HealthCondition, Sample, VitalSign};

/// Produces one value per active signal per tick.
///
/// Owns its profile (and therefore its RNG); one generator per device.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    profile: PatientProfile,
    modulator: CircadianModulator,
    noise_level: f64,
    signals: Vec<VitalSign>,
}

impl SignalGenerator {
    pub fn new(profile: PatientProfile, modulator: CircadianModulator, noise_level: f64) -> Self {
        Self {
            profile,
            modulator,
            noise_level,
            signals: VitalSign::ALL.to_vec(),
        }
    }

    /// Generator for the configured device, seeded from `[device] seed` when set.
    pub fn from_config(config: &SmartCareConfig) -> Self {
        let profile = PatientProfile::new(
            config.device.patient_id.clone(),
            config.device.condition,
            config.device.seed,
        );
        Self::new(
            profile,
            CircadianModulator::from_config(&config.simulation),
            config.simulation.noise_level,
        )
    }

    /// Restrict generation to a subset of signals (canonical order is kept).
    pub fn with_signals(mut self, signals: &[VitalSign]) -> Self {
        self.signals = VitalSign::ALL
            .into_iter()
            .filter(|s| signals.contains(s))
            .collect();
        self
    }

    pub fn profile(&self) -> &PatientProfile {
        &self.profile
    }

    pub fn signals(&self) -> &[VitalSign] {
        &self.signals
    }

    /// One tick at `ts`. Never fails.
    pub fn generate(&mut self, ts: DateTime<Utc>) -> Sample {
        let modulation = self.modulator.factors(ts);
        let mut sample = Sample::new(ts);
        for sign in self.signals.clone() {
            let value = self.generate_value(sign, modulation.get(sign));
            sample.values.insert(sign, value);
        }
        sample
    }

    fn generate_value(&mut self, sign: VitalSign, m: f64) -> f64 {
        let t = self.profile.step_trend(sign, TREND_SIGMA);
        let b = self.profile.baseline(sign);

        if sign == VitalSign::Oxygen {
            let v = b + 0.5 * t + 2.0 * m;
            let max_noise = (OXYGEN_CEILING - v).min(1.0);
            let noise = self.profile.normal(OXYGEN_NOISE_SIGMA).min(max_noise).max(-1.0);
            return round_to(v + noise, 1).clamp(OXYGEN_FLOOR, OXYGEN_CEILING);
        }

        let mut v = b + t + b * m;
        v *= 1.0 + self.profile.normal(self.noise_level);
        let (lo, hi) = sign.widened_bounds(VALUE_BAND_FRACTION);
        sign.round(v.clamp(lo, hi))
    }

    /// `floor(minutes*60 / (60/rate))` samples spaced `60/rate` seconds, starting now.
    pub fn generate_for_duration(&mut self, minutes: f64, sample_rate: f64) -> Vec<Sample> {
        self.generate_for_duration_from(Utc::now(), minutes, sample_rate)
    }

    /// Same as [`generate_for_duration`](Self::generate_for_duration) with an explicit start.
    pub fn generate_for_duration_from(
        &mut self,
        start: DateTime<Utc>,
        minutes: f64,
        sample_rate: f64,
    ) -> Vec<Sample> {
        let Some(count) = sample_count(minutes, sample_rate) else {
            return Vec::new();
        };
        let interval = 60.0 / sample_rate;
        (0..count)
            .map(|i| self.generate(start + secs(i as f64 * interval)))
            .collect()
    }
}

impl SampleSource for SignalGenerator {
    fn next_sample(&mut self, ts: DateTime<Utc>) -> Sample {
        self.generate(ts)
    }

    fn patient_id(&self) -> &str {
        &self.profile.patient_id
    }

    fn condition(&self) -> HealthCondition {
        self.profile.condition
    }
}

/// Number of samples in `minutes` at `rate` per minute; `None` for unusable input.
pub(crate) fn sample_count(minutes: f64, sample_rate: f64) -> Option<usize> {
    if !minutes.is_finite() || !sample_rate.is_finite() || minutes <= 0.0 || sample_rate <= 0.0 {
        return None;
    }
    let interval = 60.0 / sample_rate;
    Some((minutes * 60.0 / interval).floor() as usize)
}

pub(crate) fn secs(s: f64) -> Duration {
    Duration::milliseconds((s * 1000.0).round() as i64)
}
