//! Windowed trend analysis
//!
//! ## Flow
//!
//! 1. Validate the request and fetch readings from the [`ReadingStore`](crate::storage::ReadingStore)
//! 2. Build windows (trend) or fetch the comparison period (comparative)
//! 3. Ask the LLM provider for a narrative, under a timeout
//! 4. On any provider problem, use the deterministic fallback
//!
//! The caller always gets an [`AnalysisResult`](crate::types::AnalysisResult)
//! unless the request is invalid, there is no data, or storage fails.

mod windows;
mod fallback;
mod prompt;
mod parsing;
mod analyzer;

pub use windows::{build_windows, trend_windows_from_range, SignalStats, TimeWindow};
pub use fallback::{
    fallback_analysis, percent_change, snapshot_narrative, trend_narrative, window_averages,
};
pub use prompt::{build_prompt, instructions};
pub use parsing::{parse_response, strip_code_fence, ParseMode};
pub use analyzer::{AnalysisError, AnalyzerStats, TrendAnalyzer};

use crate::types::{Insight, Recommendation};

/// Summary text plus the insights and recommendations that back it.
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub summary: String,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
}
