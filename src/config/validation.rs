//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Unknown keys never fail a load.

use std::collections::HashSet;

use super::defaults::MAX_SPAN_HOURS;
use super::SmartCareConfig;

/// A non-fatal config warning (typo, unknown section).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for SmartCareConfig.
///
/// Maintained by hand to match the struct hierarchy in smartcare_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [device]
        "device",
        "device.patient_id",
        "device.device_id",
        "device.condition",
        "device.seed",
        // [simulation]
        "simulation",
        "simulation.sample_rate",
        "simulation.noise_level",
        "simulation.use_circadian_rhythms",
        "simulation.simulate_meals",
        "simulation.simulate_sleep",
        "simulation.meal_times",
        "simulation.sleep_start_hour",
        "simulation.sleep_duration_hours",
        // [emitter]
        "emitter",
        "emitter.batch_size",
        "emitter.backfill_hours",
        "emitter.devices",
        // [llm]
        "llm",
        "llm.provider",
        "llm.model",
        "llm.api_base",
        "llm.api_key_env",
        "llm.timeout_secs",
        "llm.temperature",
        "llm.max_tokens",
        // [storage]
        "storage",
        "storage.path",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so output is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

fn check_range(name: &str, value: f64, min: f64, max: f64, errors: &mut Vec<String>) {
    // NaN comparisons silently pass, so catch them explicitly
    if !value.is_finite() {
        errors.push(format!("{name} must be finite (got {value})"));
    } else if value < min || value > max {
        errors.push(format!("{name} = {value} is outside the allowed range ({min}-{max})"));
    }
}

/// Check every numeric setting; returns all problems found.
pub fn validate_ranges(config: &SmartCareConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let s = &config.simulation;
    check_range("simulation.sample_rate", s.sample_rate, 0.1, 60.0, &mut errors);
    check_range("simulation.noise_level", s.noise_level, 0.0, 1.0, &mut errors);
    if s.sleep_start_hour > 23 {
        errors.push(format!(
            "simulation.sleep_start_hour = {} must be an hour of day (0-23)",
            s.sleep_start_hour
        ));
    }
    if !(4..=12).contains(&s.sleep_duration_hours) {
        errors.push(format!(
            "simulation.sleep_duration_hours = {} is outside the allowed range (4-12)",
            s.sleep_duration_hours
        ));
    }
    for meal in &s.meal_times {
        if *meal > 23 {
            errors.push(format!(
                "simulation.meal_times contains {meal}, which is not an hour of day (0-23)"
            ));
        }
    }

    let e = &config.emitter;
    if e.batch_size == 0 {
        errors.push("emitter.batch_size must be >= 1".to_string());
    }
    if !e.backfill_hours.is_finite() || e.backfill_hours <= 0.0 {
        errors.push(format!(
            "emitter.backfill_hours must be a finite value > 0 (got {})",
            e.backfill_hours
        ));
    } else if e.backfill_hours > MAX_SPAN_HOURS {
        errors.push(format!(
            "emitter.backfill_hours = {} exceeds the {MAX_SPAN_HOURS} hour limit",
            e.backfill_hours
        ));
    }
    if e.devices == 0 {
        errors.push("emitter.devices must be >= 1".to_string());
    }

    let l = &config.llm;
    if l.timeout_secs == 0 {
        errors.push("llm.timeout_secs must be > 0".to_string());
    }
    check_range("llm.temperature", l.temperature, 0.0, 2.0, &mut errors);
    if l.max_tokens == 0 {
        errors.push("llm.max_tokens must be > 0".to_string());
    }

    if config.device.patient_id.trim().is_empty() {
        errors.push("device.patient_id must not be empty".to_string());
    }
    if config.device.device_id.trim().is_empty() {
        errors.push("device.device_id must not be empty".to_string());
    }

    errors
}

// ============================================================================
// Tests
// ============================================================================
