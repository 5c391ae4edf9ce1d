//! SmartCare Configuration Module
//!
//! Simulator, emitter, LLM and storage settings loaded from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `SMARTCARE_CONFIG` environment variable (path to TOML file)
//! 2. `smartcare.toml` in the current working directory
//! 3. Built-in defaults
//!
//! A file that is found but cannot be read, parsed or validated is a fatal
//! startup error. Unknown keys only produce warnings.
//!
//! ## Usage
//!
//! ```ignore
//! let (config, source) = SmartCareConfig::load()?;
//! let generator = SignalGenerator::from_config(&config);
//! ```
//!
//! The config is passed by reference to whatever needs it; there is no
//! process-wide global.

mod smartcare_config;
pub mod defaults;
pub mod validation;

pub use smartcare_config::*;
