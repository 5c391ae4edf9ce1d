//! Wearable signal simulator
//!
//! - [`CircadianModulator`]: time of day -> per-signal adjustment
//! - [`PatientProfile`]: baselines, trends and the RNG for one patient
//! - [`SignalGenerator`]: modulated signal model
//! - [`SimpleSignalGenerator`]: unmodulated generator with forced conditions
//! - [`SampleEmitter`]: paced streaming and historical backfill into a [`SampleSink`]

mod circadian;
mod profile;
mod generator;
mod legacy;
pub mod emitter;

pub use circadian::*;
pub use profile::*;
pub use generator::*;
pub use legacy::*;
pub use emitter::{
    backfill_devices_parallel, CollectingSink, DeviceBatch, EmitterStats, JsonLinesSink,
    SampleEmitter, SampleSink, SinkError,
};

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::config::SmartCareConfig;
use crate::types::{HealthCondition, Sample};

/// Anything that yields one sample per tick for a single patient.
pub trait SampleSource: Send {
    fn next_sample(&mut self, ts: DateTime<Utc>) -> Sample;

    fn patient_id(&self) -> &str;

    fn condition(&self) -> HealthCondition;
}

/// Which signal model drives a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorKind {
    /// Circadian, meal and sleep modulation
    #[default]
    Enhanced,
    /// No modulation, drifting baselines
    Simple,
}

impl FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enhanced" => Ok(Self::Enhanced),
            "simple" | "legacy" => Ok(Self::Simple),
            other => Err(format!("unknown generator '{other}' (expected enhanced or simple)")),
        }
    }
}

/// Identity and seed of one simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub patient_id: String,
    pub device_id: String,
    pub condition: HealthCondition,
    pub seed: Option<u64>,
}

impl DeviceSpec {
    /// The configured device, or `count` numbered devices seeded `seed + index`.
    ///
    /// With a single device the configured ids are used unchanged.
    pub fn from_config(config: &SmartCareConfig, count: usize) -> Vec<DeviceSpec> {
        let d = &config.device;
        if count <= 1 {
            return vec![DeviceSpec {
                patient_id: d.patient_id.clone(),
                device_id: d.device_id.clone(),
                condition: d.condition,
                seed: d.seed,
            }];
        }
        (0..count)
            .map(|i| DeviceSpec {
                patient_id: format!("{}-{}", d.patient_id, i + 1),
                device_id: format!("{}-{}", d.device_id, i + 1),
                condition: d.condition,
                seed: d.seed.map(|s| s.wrapping_add(i as u64)),
            })
            .collect()
    }

    /// Build the sample source for this device.
    pub fn build_source(&self, kind: GeneratorKind, config: &SmartCareConfig) -> Box<dyn SampleSource> {
        match kind {
            GeneratorKind::Enhanced => {
                let profile = PatientProfile::new(self.patient_id.clone(), self.condition, self.seed);
                Box::new(SignalGenerator::new(
                    profile,
                    CircadianModulator::from_config(&config.simulation),
                    config.simulation.noise_level,
                ))
            }
            GeneratorKind::Simple => {
                let mut g = SimpleSignalGenerator::new(
                    self.patient_id.clone(),
                    self.device_id.clone(),
                    config.simulation.noise_level,
                    self.seed,
                );
                match AbnormalCondition::try_from(self.condition) {
                    Ok(c) => g.simulate_abnormal_condition(c),
                    Err(e) => tracing::warn!(
                        device = %self.device_id,
                        error = %e,
                        "Simple generator cannot force this condition; running normal"
                    ),
                }
                Box::new(g)
            }
        }
    }
}

impl SampleSource for Box<dyn SampleSource> {
    fn next_sample(&mut self, ts: DateTime<Utc>) -> Sample {
        (**self).next_sample(ts)
    }

    fn patient_id(&self) -> &str {
        (**self).patient_id()
    }

    fn condition(&self) -> HealthCondition {
        (**self).condition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_device_keeps_configured_ids() {
        let mut config = SmartCareConfig::default();
        config.device.seed = Some(5);
        let specs = DeviceSpec::from_config(&config, 1);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].patient_id, "patient-1");
        assert_eq!(specs[0].seed, Some(5));
    }

    #[test]
    fn test_multi_device_seeds_are_offset() {
        let mut config = SmartCareConfig::default();
        config.device.seed = Some(100);
        let specs = DeviceSpec::from_config(&config, 3);
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[2].device_id, "wearable-1-3");
        assert_eq!(specs[2].patient_id, "patient-1-3");
        assert_eq!(
            specs.iter().map(|s| s.seed).collect::<Vec<_>>(),
            vec![Some(100), Some(101), Some(102)]
        );
    }

    #[test]
    fn test_generator_kind_parse() {
        assert_eq!("Simple".parse::<GeneratorKind>().unwrap(), GeneratorKind::Simple);
        assert!("fancy".parse::<GeneratorKind>().is_err());
    }

    #[test]
    fn test_simple_source_reports_forced_condition() {
        let mut config = SmartCareConfig::default();
        config.device.condition = HealthCondition::Hypoxia;
        let spec = &DeviceSpec::from_config(&config, 1)[0];
        let source = spec.build_source(GeneratorKind::Simple, &config);
        assert_eq!(source.condition(), HealthCondition::Hypoxia);
    }
}
