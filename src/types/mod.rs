//! Shared data structures for wearable telemetry and trend analysis
//!
//! - Signals: `VitalSign` with ranges and rounding, `HealthCondition` multipliers
//! - Telemetry: `Sample` (one generator tick), `Reading` (one stored value), wire format
//! - Analysis: `AnalysisRequest`, `PatientData`, `AnalysisResult`

mod vitals;
mod condition;
mod reading;
mod analysis;

pub use vitals::*;
pub use condition::*;
pub use reading::*;
pub use analysis::*;
