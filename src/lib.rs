//! SmartCare Insight: wearable vital-sign simulation and trend analysis
//!
//! ## Architecture
//!
//! - **Simulator**: per-patient signal model with circadian, meal and sleep modulation
//! - **Emitter**: paced streaming or historical backfill of wire samples into a sink
//! - **Ingest**: wire samples to stored readings, with anomaly flags
//! - **Analysis**: window builder, LLM narrative with a deterministic fallback
//! - **LLM Module**: provider trait with an OpenAI-compatible client and a stub

pub mod config;
pub mod types;
pub mod simulator;
pub mod storage;
pub mod llm;
pub mod analysis;
pub mod ingest;

// Re-export configuration
pub use config::{ConfigError, SmartCareConfig};

// Re-export commonly used types
pub use types::{
    AnalysisKind, AnalysisParams, AnalysisRequest, AnalysisResult, HealthCondition, Insight,
    Reading, Recommendation, Sample, VitalSign, WindowSpec,
};

// Re-export the simulator
pub use simulator::{
    GeneratorKind, PatientProfile, SampleEmitter, SampleSink, SampleSource, SignalGenerator,
};

// Re-export analysis and storage
pub use analysis::{AnalysisError, TimeWindow, TrendAnalyzer};
pub use storage::{MemoryStore, ReadingStore, SledReadingStore, StorageError};

// Re-export LLM components
pub use llm::{LlmError, LlmProvider};

pub use ingest::Ingestor;
