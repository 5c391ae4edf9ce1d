//! Deterministic provider for demos and tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{LlmError, LlmProvider};

const CANNED_RESPONSE: &str = r#"{
  "summary": "Vital signs reviewed by the stub provider.",
  "insights": [
    {"text": "Readings were received and summarised", "confidence": 0.5, "related_measurements": []}
  ],
  "recommendations": [
    {"text": "Configure a real provider for clinical analysis", "priority": 1, "rationale": "Stub output is not a clinical assessment"}
  ]
}"#;

#[derive(Debug, Clone)]
pub enum StubMode {
    /// Return this text verbatim
    Respond(String),
    /// Fail with `MalformedResponse(reason)`
    Fail(String),
    /// Never return
    Stall,
}

#[derive(Debug)]
pub struct StubProvider {
    mode: StubMode,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(mode: StubMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn canned() -> Self {
        Self::new(StubMode::Respond(CANNED_RESPONSE.to_string()))
    }

    pub fn responding(text: impl Into<String>) -> Self {
        Self::new(StubMode::Respond(text.into()))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(StubMode::Fail(reason.into()))
    }

    pub fn stalled() -> Self {
        Self::new(StubMode::Stall)
    }

    /// Number of `complete` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.mode {
            StubMode::Respond(text) => Ok(text.clone()),
            StubMode::Fail(reason) => Err(LlmError::MalformedResponse(reason.clone())),
            StubMode::Stall => {
                std::future::pending::<()>().await;
                Err(LlmError::Timeout(0))
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_response_is_json() {
        let stub = StubProvider::canned();
        let text = stub.complete("s", "p").await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(v["summary"].is_string());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_counts_calls() {
        let stub = StubProvider::failing("boom");
        assert!(stub.complete("s", "p").await.is_err());
        assert!(stub.complete("s", "p").await.is_err());
        assert_eq!(stub.calls(), 2);
    }
}
