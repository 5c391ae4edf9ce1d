//! Time-of-day modulation: circadian rhythm, post-meal glucose, sleep

use chrono::{DateTime, Timelike, Utc};
use std::f64::consts::PI;

use crate::config::SimulationConfig;
use crate::types::VitalSign;

/// Fractional hour of day (`hour + minute/60`).
pub fn hour_of_day(ts: DateTime<Utc>) -> f64 {
    f64::from(ts.hour()) + f64::from(ts.minute()) / 60.0
}

/// Relative adjustment per signal for one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Modulation([f64; 6]);

impl Modulation {
    pub fn get(&self, sign: VitalSign) -> f64 {
        self.0[sign.index()]
    }

    fn add(&mut self, sign: VitalSign, delta: f64) {
        self.0[sign.index()] += delta;
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

/// Maps an instant to a [`Modulation`]. Pure; holds only configuration.
#[derive(Debug, Clone)]
pub struct CircadianModulator {
    pub use_circadian_rhythms: bool,
    pub simulate_meals: bool,
    pub simulate_sleep: bool,
    pub meal_times: Vec<f64>,
    pub sleep_start_hour: f64,
    pub sleep_duration_hours: f64,
}

impl Default for CircadianModulator {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl CircadianModulator {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            use_circadian_rhythms: config.use_circadian_rhythms,
            simulate_meals: config.simulate_meals,
            simulate_sleep: config.simulate_sleep,
            meal_times: config.meal_times.iter().map(|h| f64::from(*h)).collect(),
            sleep_start_hour: f64::from(config.sleep_start_hour),
            sleep_duration_hours: f64::from(config.sleep_duration_hours),
        }
    }

    /// A modulator that always returns zero factors.
    pub fn disabled() -> Self {
        Self {
            use_circadian_rhythms: false,
            simulate_meals: false,
            simulate_sleep: false,
            ..Self::default()
        }
    }

    pub fn factors(&self, ts: DateTime<Utc>) -> Modulation {
        self.factors_at_hour(hour_of_day(ts))
    }

    /// Factors for a fractional hour of day in `[0, 24)`.
    pub fn factors_at_hour(&self, h: f64) -> Modulation {
        let mut m = Modulation::default();
        if !self.use_circadian_rhythms {
            return m;
        }

        // c is 1 at 04:00 and 0 at 16:00
        let c = 0.5 * (1.0 + (2.0 * PI * (h - 4.0) / 24.0).cos());
        let phase = c - 0.5;

        // Morning blood pressure surge centred on 08:00
        let surge = 0.3 * (-(h - 8.0).powi(2) / 8.0).exp();

        m.add(VitalSign::HeartRate, 0.2 * phase);
        m.add(VitalSign::SystolicBp, 0.1 * phase + surge);
        m.add(VitalSign::DiastolicBp, 0.08 * phase + 0.8 * surge);
        m.add(VitalSign::Glucose, 0.1 * phase);
        m.add(VitalSign::Oxygen, -0.01 * phase);
        m.add(VitalSign::Activity, 0.4 * phase);

        if self.simulate_meals {
            m.add(VitalSign::Glucose, self.meal_effect(h));
        }

        if self.simulate_sleep && self.is_asleep(h) {
            m.add(VitalSign::Activity, -0.8);
            m.add(VitalSign::HeartRate, -0.15);
            m.add(VitalSign::SystolicBp, -0.1);
            m.add(VitalSign::DiastolicBp, -0.1);
        }

        m
    }

    /// Summed post-prandial glucose bump over all meals.
    pub fn meal_effect(&self, h: f64) -> f64 {
        self.meal_times
            .iter()
            .map(|meal| (h - meal).rem_euclid(24.0))
            .filter(|x| (0.5..=3.0).contains(x))
            .map(|x| 0.4 * (-(x - 1.5).powi(2)).exp())
            .sum()
    }

    /// Whether `h` falls in `[start, start + duration)`, wrapping midnight.
    pub fn is_asleep(&self, h: f64) -> bool {
        let start = self.sleep_start_hour;
        let end = (start + self.sleep_duration_hours).rem_euclid(24.0);
        if start < end {
            (start..end).contains(&h)
        } else {
            h >= start || h < end
        }
    }
}
