//! Config Validation Tests
//!
//! Typo detection and range validation exercised through the public
//! loading API, independent of the simulator and analyzer.

use smartcare_insight::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use smartcare_insight::config::{ConfigError, LlmProviderKind, SmartCareConfig};
use smartcare_insight::types::HealthCondition;
use std::io::Write;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_simulation_section_warns_with_suggestion() {
    let toml_str = r#"
[simulation]
sampel_rate = 6.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("sampel_rate"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("simulation.sample_rate"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_device_section_warns() {
    let toml_str = r#"
[device]
patient_di = "patient-9"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("device.patient_id"));
}

#[test]
fn unknown_section_has_no_close_match() {
    let warnings = validate_unknown_keys("[telemetry_exporter]\nendpoint = \"x\"\n");
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn every_known_key_is_suggestible_to_itself() {
    let known = known_config_keys();
    for key in &known {
        assert_eq!(suggest_correction(key, &known).as_deref(), Some(*key));
    }
}

#[test]
fn unknown_keys_do_not_fail_the_load() {
    let config = SmartCareConfig::from_toml_str(
        r#"
[device]
patient_id = "patient-42"
colour = "blue"
"#,
    )
    .expect("unknown keys are warnings only");
    assert_eq!(config.device.patient_id, "patient-42");
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn all_range_problems_are_reported_together() {
    let mut config = SmartCareConfig::default();
    config.simulation.noise_level = 1.5;
    config.simulation.sleep_start_hour = 24;
    config.emitter.batch_size = 0;
    config.llm.temperature = f64::NAN;

    let errors = validate_ranges(&config);
    assert_eq!(errors.len(), 4, "got: {errors:?}");
    assert!(errors.iter().any(|e| e.contains("noise_level")));
    assert!(errors.iter().any(|e| e.contains("sleep_start_hour")));
    assert!(errors.iter().any(|e| e.contains("batch_size")));
    assert!(errors.iter().any(|e| e.contains("temperature")));
}

#[test]
fn out_of_range_file_is_a_validation_error() {
    let result = SmartCareConfig::from_toml_str("[emitter]\ndevices = 0\n");
    match result {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("emitter.devices")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn backfill_longer_than_ten_years_is_rejected() {
    let mut config = SmartCareConfig::default();
    config.emitter.backfill_hours = 1e12;
    config.emitter.batch_size = 2;
    let errors = validate_ranges(&config);
    assert_eq!(errors.len(), 1, "got: {errors:?}");
    assert!(errors[0].contains("emitter.backfill_hours"));
    assert!(config.validate().is_err());

    config.emitter.backfill_hours = 87_600.0;
    assert!(validate_ranges(&config).is_empty());
}

#[test]
fn meal_hour_outside_day_is_rejected() {
    let mut config = SmartCareConfig::default();
    config.simulation.meal_times = vec![7, 25];
    let errors = validate_ranges(&config);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("25"));
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn full_file_loads_every_section() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[device]
patient_id = "patient-7"
device_id = "watch-7"
condition = "tachycardia"
seed = 99

[simulation]
sample_rate = 12.0
simulate_meals = false

[emitter]
batch_size = 250
backfill_hours = 48.0
devices = 3

[llm]
provider = "stub"
timeout_secs = 20

[storage]
path = "/tmp/smartcare-test.db"
"#
    )
    .unwrap();

    let config = SmartCareConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.device.condition, HealthCondition::Tachycardia);
    assert_eq!(config.device.seed, Some(99));
    assert!(!config.simulation.simulate_meals);
    assert!((config.simulation.sample_interval_secs() - 5.0).abs() < 1e-9);
    assert_eq!(config.emitter.devices, 3);
    assert_eq!(config.llm.provider, LlmProviderKind::Stub);
    assert_eq!(config.llm.timeout_secs, 20);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SmartCareConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn saved_config_loads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("smartcare.toml");

    let mut config = SmartCareConfig::default();
    config.device.condition = HealthCondition::Hypoxia;
    config.emitter.backfill_hours = 30.0;
    config.save_to_file(&path).unwrap();

    let loaded = SmartCareConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.to_toml().unwrap(), config.to_toml().unwrap());
}
