//! SmartCare configuration - simulator, emitter, LLM and storage settings as TOML
//!
//! Each struct implements `Default` with the values the simulator ships with,
//! so a missing config file behaves exactly like an empty one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::HealthCondition;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SMARTCARE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "smartcare.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `SmartCareConfig::load()` which searches:
/// 1. `$SMARTCARE_CONFIG` env var
/// 2. `./smartcare.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartCareConfig {
    /// Simulated device identity
    #[serde(default)]
    pub device: DeviceConfig,

    /// Signal model and modulation settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Streaming / backfill settings
    #[serde(default)]
    pub emitter: EmitterConfig,

    /// LLM provider selection
    #[serde(default)]
    pub llm: LlmConfig,

    /// Reading store location
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where a loaded config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Env(PathBuf),
    Local(PathBuf),
    Defaults,
}

impl SmartCareConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SMARTCARE_CONFIG` environment variable
    /// 2. `./smartcare.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that exists but fails to read, parse or validate is an error.
    pub fn load() -> Result<(Self, ConfigSource), ConfigError> {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), patient = %config.device.patient_id, "Loaded config from SMARTCARE_CONFIG");
                return Ok((config, ConfigSource::Env(p)));
            }
            warn!(path = %path, "SMARTCARE_CONFIG points to non-existent file, falling back");
        }

        // 2. Check ./smartcare.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(patient = %config.device.patient_id, "Loaded config from ./smartcare.toml");
            return Ok((config, ConfigSource::Local(local)));
        }

        // 3. Defaults
        info!("No smartcare.toml found, using built-in defaults");
        Ok((Self::default(), ConfigSource::Defaults))
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings and otherwise ignored.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the config to `path`, e.g. to seed a new deployment.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Validate every setting and collect all problems.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_ranges(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Device
// ============================================================================

/// Identity of the simulated wearable and the patient wearing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_patient_id")]
    pub patient_id: String,

    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Condition applied to the patient's baselines
    #[serde(default)]
    pub condition: HealthCondition,

    /// Fixed RNG seed; entropy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_patient_id() -> String {
    "patient-1".to_string()
}
fn default_device_id() -> String {
    "wearable-1".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            patient_id: default_patient_id(),
            device_id: default_device_id(),
            condition: HealthCondition::Healthy,
            seed: None,
        }
    }
}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Samples per minute (0.1-60)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    /// Relative noise std-dev (0-1)
    #[serde(default = "default_noise_level")]
    pub noise_level: f64,

    #[serde(default = "default_true")]
    pub use_circadian_rhythms: bool,

    #[serde(default = "default_true")]
    pub simulate_meals: bool,

    #[serde(default = "default_true")]
    pub simulate_sleep: bool,

    /// Meal hours of day (0-23)
    #[serde(default = "default_meal_times")]
    pub meal_times: Vec<u32>,

    /// Hour of day sleep begins (0-23)
    #[serde(default = "default_sleep_start")]
    pub sleep_start_hour: u32,

    /// Sleep length in hours (4-12)
    #[serde(default = "default_sleep_duration")]
    pub sleep_duration_hours: u32,
}

fn default_sample_rate() -> f64 { 4.0 }
fn default_noise_level() -> f64 { 0.02 }
fn default_true() -> bool { true }
fn default_meal_times() -> Vec<u32> { vec![7, 12, 19] }
fn default_sleep_start() -> u32 { 23 }
fn default_sleep_duration() -> u32 { 8 }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            noise_level: default_noise_level(),
            use_circadian_rhythms: true,
            simulate_meals: true,
            simulate_sleep: true,
            meal_times: default_meal_times(),
            sleep_start_hour: default_sleep_start(),
            sleep_duration_hours: default_sleep_duration(),
        }
    }
}

impl SimulationConfig {
    /// Seconds between consecutive samples.
    pub fn sample_interval_secs(&self) -> f64 {
        60.0 / self.sample_rate
    }
}

// ============================================================================
// Emitter
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Samples produced per device by a backfill run
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Historical span covered by a backfill run
    #[serde(default = "default_backfill_hours")]
    pub backfill_hours: f64,

    /// Independent devices to simulate
    #[serde(default = "default_devices")]
    pub devices: usize,
}

fn default_batch_size() -> usize { 1000 }
fn default_backfill_hours() -> f64 { 24.0 }
fn default_devices() -> usize { 1 }

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            backfill_hours: default_backfill_hours(),
            devices: default_devices(),
        }
    }
}

// ============================================================================
// LLM
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    Openai,
    /// Deterministic canned response, for demos and tests
    Stub,
    /// No provider; every analysis uses the fallback
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the env var holding the API key (the key itself never lives in the file)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String { "gpt-4o-mini".to_string() }
fn default_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout_secs() -> u64 { super::defaults::LLM_TIMEOUT_SECS }
fn default_temperature() -> f64 { 0.3 }
fn default_max_tokens() -> u32 { 1000 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/readings.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}
