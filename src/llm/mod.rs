//! LLM Provider Module
//!
//! The analyzer talks to a language model through [`LlmProvider`]. Two
//! implementations exist:
//!
//! - **OpenAiProvider**: OpenAI-compatible `/chat/completions` over HTTP
//! - **StubProvider**: canned, failing or stalling responses for demos and tests
//!
//! The provider is chosen by `[llm] provider` in the config. Every error is
//! recoverable from the analyzer's point of view: it logs and falls back to
//! the deterministic analysis.

use async_trait::async_trait;
use std::sync::Arc;

mod openai;
mod stub;

pub use openai::OpenAiProvider;
pub use stub::{StubMode, StubProvider};

use crate::config::{LlmConfig, LlmProviderKind};

/// LLM errors
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider timed out after {0}s")]
    Timeout(u64),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Unified trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One completion for `prompt` under `system`. Single attempt, no retries.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;

    /// Get the provider name for logging
    fn provider_name(&self) -> &'static str;

    /// Cheap reachability probe
    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// Build the configured provider.
///
/// `Ok(None)` means analysis runs on the fallback only. A missing API key is
/// `NotConfigured`; callers decide whether that is fatal.
pub fn build_provider(config: &LlmConfig) -> Result<Option<Arc<dyn LlmProvider>>, LlmError> {
    match config.provider {
        LlmProviderKind::None => {
            tracing::info!("LLM provider disabled; analyses will use the deterministic fallback");
            Ok(None)
        }
        LlmProviderKind::Stub => {
            tracing::info!("Using stub LLM provider");
            Ok(Some(Arc::new(StubProvider::canned())))
        }
        LlmProviderKind::Openai => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    LlmError::NotConfigured(format!("environment variable {} is not set", config.api_key_env))
                })?;
            let provider = OpenAiProvider::new(config, api_key)?;
            tracing::info!(
                model = %config.model,
                api_base = %config.api_base,
                timeout_secs = config.timeout_secs,
                "OpenAI-compatible provider configured"
            );
            Ok(Some(Arc::new(provider)))
        }
    }
}
