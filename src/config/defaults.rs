//! System-wide default constants.
//!
//! Centralises magic numbers used by the simulator, emitter and analyzer.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Signal Model
// ============================================================================

/// Std-dev of the per-tick trend step for the modulated generator.
pub const TREND_SIGMA: f64 = 0.05;

/// Std-dev of the per-tick trend step for the simple generator.
pub const SIMPLE_TREND_SIGMA: f64 = 0.1;

/// Trend damping applied after each random step.
pub const TREND_DECAY: f64 = 0.95;

/// Fraction of the normal range allowed beyond each edge of a generated value.
pub const VALUE_BAND_FRACTION: f64 = 0.3;

/// Fraction of the normal range the simple generator's baseline may drift beyond each edge.
pub const BASELINE_DRIFT_FRACTION: f64 = 0.2;

/// Std-dev of the additive oxygen noise (percentage points).
pub const OXYGEN_NOISE_SIGMA: f64 = 0.3;

/// Hard physiological floor / ceiling for generated oxygen saturation.
pub const OXYGEN_FLOOR: f64 = 90.0;
pub const OXYGEN_CEILING: f64 = 100.0;

/// Oxygen baseline centre; a uniform offset of +/-1 is added per profile.
pub const OXYGEN_BASELINE_CENTER: f64 = 98.0;

// ============================================================================
// Emitter
// ============================================================================

/// Upper bound on the backfill progress-log interval (samples).
pub const BACKFILL_PROGRESS_MAX_INTERVAL: usize = 100;

/// Longest history a backfill or window layout may cover: ten years, in hours.
pub const MAX_SPAN_HOURS: f64 = 87_600.0;

// ============================================================================
// Analyzer
// ============================================================================

/// Maximum raw sample points per signal included in an LLM prompt.
pub const PROMPT_MAX_POINTS: usize = 20;

/// Maximum anomalous events described in an event-based prompt.
pub const PROMPT_MAX_EVENTS: usize = 10;

/// Percentage change above which a per-window trend is significant.
pub const TREND_SIGNIFICANCE_PERCENT: f64 = 10.0;

/// Heart-rate rise (percent) that earns a closer-monitoring recommendation.
pub const TREND_HR_RISE_PERCENT: f64 = 10.0;

/// Oxygen fall (percent, negative) that earns a respiratory recommendation.
pub const TREND_OXYGEN_DROP_PERCENT: f64 = -5.0;

/// Activity fall (percent, negative) that earns a mobility recommendation.
pub const TREND_ACTIVITY_DROP_PERCENT: f64 = -15.0;

/// Default LLM call timeout (seconds).
pub const LLM_TIMEOUT_SECS: u64 = 300;

/// System prompt for every analysis request.
pub const LLM_SYSTEM_PROMPT: &str = "You are a healthcare AI assistant analyzing patient vital signs data. \
Provide clinical insights and recommendations based on the data.";
