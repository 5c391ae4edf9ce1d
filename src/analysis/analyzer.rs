//! Trend analyzer: request in, result out
//!
//! Holds only `Arc` handles, so one analyzer serves any number of concurrent
//! requests. The LLM call is a single attempt under `tokio::time::timeout`.

use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::fallback::fallback_analysis;
use super::parsing::{parse_response, ParseMode};
use super::prompt::build_prompt;
use super::windows::build_windows;
use super::Narrative;
use crate::config::defaults::LLM_SYSTEM_PROMPT;
use crate::config::LlmConfig;
use crate::llm::{LlmError, LlmProvider};
use crate::storage::{ReadingStore, StorageError};
use crate::types::{
    AnalysisKind, AnalysisParams, AnalysisRequest, AnalysisResult, ComparisonPeriod, GeneratedBy,
    InvalidRequest, PatientData,
};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),
    #[error("no data found for patient {patient_id} in the requested range")]
    NoData { patient_id: String },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Counters since construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzerStats {
    pub requests: u64,
    pub llm_results: u64,
    pub fallback_results: u64,
    pub rejected: u64,
}

impl std::fmt::Display for AnalyzerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Analyzer: {} requests ({} llm, {} fallback, {} rejected)",
            self.requests, self.llm_results, self.fallback_results, self.rejected
        )
    }
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    llm_results: AtomicU64,
    fallback_results: AtomicU64,
    rejected: AtomicU64,
}

pub struct TrendAnalyzer {
    store: Arc<dyn ReadingStore>,
    provider: Option<Arc<dyn LlmProvider>>,
    llm_timeout: Duration,
    counters: Counters,
}

impl TrendAnalyzer {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        provider: Option<Arc<dyn LlmProvider>>,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            llm_timeout,
            counters: Counters::default(),
        }
    }

    pub fn from_config(
        store: Arc<dyn ReadingStore>,
        provider: Option<Arc<dyn LlmProvider>>,
        config: &LlmConfig,
    ) -> Self {
        Self::new(store, provider, Duration::from_secs(config.timeout_secs))
    }

    pub fn stats(&self) -> AnalyzerStats {
        AnalyzerStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            llm_results: self.counters.llm_results.load(Ordering::Relaxed),
            fallback_results: self.counters.fallback_results.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Validate `request` and gather everything its kind needs.
    pub fn prepare(&self, request: &AnalysisRequest) -> Result<PatientData, AnalysisError> {
        request.validate()?;

        let (start, end) = request.primary_range();
        let signals = request.signals.as_deref();
        let readings = self.store.fetch(&request.patient_id, start, end, signals)?;
        if readings.is_empty() {
            return Err(AnalysisError::NoData {
                patient_id: request.patient_id.clone(),
            });
        }

        let mut data = PatientData::new(request.patient_id.clone(), start, end, readings);
        match &request.params {
            AnalysisParams::TrendAnalysis(spec) => {
                let windows = build_windows(&data.readings, spec, end);
                debug!(
                    patient = %request.patient_id,
                    windows = windows.len(),
                    empty = windows.iter().filter(|w| w.is_empty()).count(),
                    "Trend windows built"
                );
                data.windows = Some(windows);
                data.window_spec = Some(*spec);
            }
            AnalysisParams::Comparative {
                comparison_start_time,
                comparison_end_time,
            } => {
                let readings = self.store.fetch(
                    &request.patient_id,
                    *comparison_start_time,
                    *comparison_end_time,
                    signals,
                )?;
                data.comparison = Some(ComparisonPeriod {
                    start_time: *comparison_start_time,
                    end_time: *comparison_end_time,
                    readings,
                });
            }
            AnalysisParams::EventBased {
                context_window_minutes,
                ..
            } => {
                data.context_window_minutes = Some(*context_window_minutes);
            }
            AnalysisParams::TimeWindow => {}
        }
        Ok(data)
    }

    /// Run one analysis.
    ///
    /// Provider failures never surface here; they degrade to the fallback.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let data = match self.prepare(request) {
            Ok(d) => d,
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };
        let kind = request.kind();

        let result = match self.narrate(kind, &data).await {
            Some(narrative) => {
                self.counters.llm_results.fetch_add(1, Ordering::Relaxed);
                AnalysisResult {
                    patient_id: data.patient_id.clone(),
                    analysis_type: kind,
                    summary: narrative.summary,
                    insights: narrative.insights,
                    recommendations: narrative.recommendations,
                    data_points_analyzed: data.readings.len(),
                    time_period: data.time_period(),
                    windows: data.windows.clone(),
                    generated_by: GeneratedBy::Llm,
                }
            }
            None => {
                self.counters.fallback_results.fetch_add(1, Ordering::Relaxed);
                fallback_analysis(kind, &data)
            }
        };

        info!(
            patient = %result.patient_id,
            kind = %kind,
            data_points = result.data_points_analyzed,
            insights = result.insights.len(),
            generated_by = ?result.generated_by,
            "Analysis complete"
        );
        Ok(result)
    }

    /// Run independent analyses concurrently; results keep request order.
    pub async fn analyze_many(
        &self,
        requests: &[AnalysisRequest],
    ) -> Vec<Result<AnalysisResult, AnalysisError>> {
        join_all(requests.iter().map(|r| self.analyze(r))).await
    }

    /// LLM narrative, or `None` when the fallback should be used.
    async fn narrate(&self, kind: AnalysisKind, data: &PatientData) -> Option<Narrative> {
        let Some(provider) = &self.provider else {
            debug!("No LLM provider configured; using fallback");
            return None;
        };

        let prompt = build_prompt(kind, data);
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.llm_timeout, provider.complete(LLM_SYSTEM_PROMPT, &prompt))
            .await
            .unwrap_or(Err(LlmError::Timeout(self.llm_timeout.as_secs())));

        match outcome {
            Ok(text) => {
                let (narrative, mode) = parse_response(&text);
                if mode == ParseMode::Lines {
                    warn!(
                        provider = provider.provider_name(),
                        "LLM response was not structured JSON; used line extraction"
                    );
                }
                debug!(
                    provider = provider.provider_name(),
                    latency_ms = started.elapsed().as_millis() as u64,
                    "LLM narrative received"
                );
                Some(narrative)
            }
            Err(e) => {
                warn!(
                    provider = provider.provider_name(),
                    patient = %data.patient_id,
                    error = %e,
                    "LLM analysis failed; using deterministic fallback"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubProvider;
    use crate::storage::MemoryStore;
    use crate::types::{Reading, VitalSign, WindowSpec};
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 26, 18, 0, 0).unwrap()
    }

    fn store_with_hr(values_per_hour: &[f64]) -> Arc<MemoryStore> {
        let n = values_per_hour.len() as i64;
        let readings = values_per_hour
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let ts = end() - ChronoDuration::hours(n - i as i64) + ChronoDuration::minutes(30);
                Reading::new(ts, VitalSign::HeartRate, v, "p1", "d1")
            })
            .collect();
        Arc::new(MemoryStore::with_readings(readings))
    }

    #[tokio::test]
    async fn test_no_data_is_an_error() {
        let analyzer = TrendAnalyzer::new(Arc::new(MemoryStore::new()), None, Duration::from_secs(1));
        let req = AnalysisRequest::time_window("p1", end() - ChronoDuration::hours(1), end());
        let err = analyzer.analyze(&req).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoData { .. }));
        assert_eq!(analyzer.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_fetch() {
        let analyzer = TrendAnalyzer::new(store_with_hr(&[70.0]), None, Duration::from_secs(1));
        let req = AnalysisRequest::trend("p1", end(), WindowSpec::new(0, 6.0, 0.0));
        assert!(matches!(analyzer.analyze(&req).await, Err(AnalysisError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_trend_without_provider_uses_fallback() {
        let analyzer = TrendAnalyzer::new(store_with_hr(&[70.0, 72.0, 90.0]), None, Duration::from_secs(1));
        let req = AnalysisRequest::trend("p1", end(), WindowSpec::new(3, 1.0, 0.0));
        let result = analyzer.analyze(&req).await.unwrap();
        assert_eq!(result.generated_by, GeneratedBy::Fallback);
        assert_eq!(result.data_points_analyzed, 3);
        assert_eq!(result.time_period, "3.0 hours");
        assert_eq!(result.windows.as_ref().map(Vec::len), Some(3));
        assert!(result.insights[0].text.starts_with("HR shows a increasing trend"));
    }

    #[tokio::test]
    async fn test_llm_answer_is_used() {
        let stub = Arc::new(StubProvider::responding(
            r#"{"summary":"From the model","insights":[],"recommendations":[]}"#,
        ));
        let analyzer = TrendAnalyzer::new(store_with_hr(&[70.0, 71.0]), Some(stub.clone()), Duration::from_secs(5));
        let req = AnalysisRequest::time_window("p1", end() - ChronoDuration::hours(3), end());
        let result = analyzer.analyze(&req).await.unwrap();
        assert_eq!(result.summary, "From the model");
        assert_eq!(result.generated_by, GeneratedBy::Llm);
        assert!(result.windows.is_none());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_falls_back_without_retry() {
        let stub = Arc::new(StubProvider::failing("upstream 500"));
        let analyzer = TrendAnalyzer::new(store_with_hr(&[110.0, 112.0]), Some(stub.clone()), Duration::from_secs(5));
        let req = AnalysisRequest::time_window("p1", end() - ChronoDuration::hours(3), end());
        let result = analyzer.analyze(&req).await.unwrap();
        assert_eq!(result.generated_by, GeneratedBy::Fallback);
        assert_eq!(result.summary, "Elevated average heart rate (111.0 bpm)");
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_provider_times_out() {
        let stub = Arc::new(StubProvider::stalled());
        let analyzer = TrendAnalyzer::new(store_with_hr(&[70.0]), Some(stub), Duration::from_secs(300));
        let req = AnalysisRequest::time_window("p1", end() - ChronoDuration::hours(3), end());
        let result = analyzer.analyze(&req).await.unwrap();
        assert_eq!(result.generated_by, GeneratedBy::Fallback);
        assert_eq!(analyzer.stats().fallback_results, 1);
    }

    #[tokio::test]
    async fn test_comparative_fetches_second_period() {
        let store = store_with_hr(&[70.0, 71.0, 72.0, 73.0]);
        let analyzer = TrendAnalyzer::new(store, None, Duration::from_secs(1));
        let req = AnalysisRequest::time_window("p1", end() - ChronoDuration::hours(2), end()).with_params(
            AnalysisParams::Comparative {
                comparison_start_time: end() - ChronoDuration::hours(4),
                comparison_end_time: end() - ChronoDuration::hours(2),
            },
        );
        let data = analyzer.prepare(&req).unwrap();
        assert_eq!(data.readings.len(), 2);
        assert_eq!(data.comparison.as_ref().map(|c| c.readings.len()), Some(2));
        assert!(data.windows.is_none());
    }

    #[tokio::test]
    async fn test_many_requests_keep_order() {
        let analyzer = TrendAnalyzer::new(store_with_hr(&[70.0, 71.0]), None, Duration::from_secs(1));
        let ok = AnalysisRequest::time_window("p1", end() - ChronoDuration::hours(3), end());
        let missing = AnalysisRequest::time_window("nobody", end() - ChronoDuration::hours(3), end());
        let results = analyzer.analyze_many(&[ok, missing]).await;
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(analyzer.stats().requests, 2);
    }
}
