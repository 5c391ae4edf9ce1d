//! SmartCare Insight - Main Entry Point
//!
//! Wearable vital-sign ingest and trend analysis.
//!
//! ## Commands
//!
//! - `ingest`: read wire samples (JSON lines) from stdin into the reading store
//! - `analyze`: run one analysis for a patient and print the result as JSON
//! - `check-config`: validate the config file, optionally probing the LLM provider
//!
//! ```bash
//! ./simulation --batch --batch-size 2000 --backfill-hours 30 | ./smartcare ingest
//! ./smartcare analyze --patient patient-001 --kind trend_analysis --window-count 5
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use smartcare_insight::analysis::TrendAnalyzer;
use smartcare_insight::config::SmartCareConfig;
use smartcare_insight::ingest::Ingestor;
use smartcare_insight::llm::{build_provider, LlmError, LlmProvider};
use smartcare_insight::storage::{ReadingStore, SledReadingStore};
use smartcare_insight::types::{hours, AnalysisKind, AnalysisParams, AnalysisRequest, VitalSign, WindowSpec};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "smartcare")]
#[command(about = "SmartCare Insight wearable ingest and trend analysis")]
#[command(version)]
struct CliArgs {
    /// Config file (defaults to $SMARTCARE_CONFIG, then ./smartcare.toml)
    #[arg(short, long, global = true, env = "SMARTCARE_CONFIG")]
    config: Option<PathBuf>,

    /// Reading store path (overrides storage.path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Store wire samples read from stdin, flagging anomalous values
    Ingest {
        /// Readings buffered per store write
        #[arg(long, default_value = "512")]
        batch_size: usize,
    },

    /// Analyze a patient's stored readings and print the result as JSON
    Analyze(AnalyzeArgs),

    /// Validate the config file
    CheckConfig {
        /// Also check that the configured LLM provider is reachable
        #[arg(long)]
        probe_llm: bool,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[arg(long)]
    patient: String,

    /// time_window, event_based, comparative or trend_analysis
    #[arg(long, default_value = "time_window")]
    kind: AnalysisKind,

    /// Range start (RFC 3339); defaults to `--hours` before the end
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Range end (RFC 3339); defaults to now
    #[arg(long)]
    end: Option<DateTime<Utc>>,

    /// Range length when `--start` is omitted
    #[arg(long, default_value = "24")]
    hours: f64,

    /// Restrict to these signals (comma separated, e.g. hr,oxygen)
    #[arg(long, value_delimiter = ',')]
    signals: Vec<VitalSign>,

    #[arg(long, default_value = "5")]
    window_count: usize,

    #[arg(long, default_value = "6")]
    window_duration: f64,

    /// Gap between consecutive windows, in hours
    #[arg(long, default_value = "0")]
    window_interval: f64,

    #[arg(long)]
    comparison_start: Option<DateTime<Utc>>,

    #[arg(long)]
    comparison_end: Option<DateTime<Utc>>,

    /// Minutes of context around each anomalous event
    #[arg(long, default_value = "30")]
    context_minutes: f64,

    /// Skip the LLM and use the deterministic analysis
    #[arg(long)]
    no_llm: bool,
}

impl AnalyzeArgs {
    fn to_request(&self) -> Result<AnalysisRequest> {
        let end = self.end.unwrap_or_else(Utc::now);
        let start = self.start.unwrap_or_else(|| end - hours(self.hours));

        let request = match self.kind {
            AnalysisKind::TrendAnalysis => AnalysisRequest::trend(
                self.patient.clone(),
                end,
                WindowSpec::new(self.window_count, self.window_duration, self.window_interval),
            ),
            AnalysisKind::TimeWindow => AnalysisRequest::time_window(self.patient.clone(), start, end),
            AnalysisKind::EventBased => AnalysisRequest::time_window(self.patient.clone(), start, end)
                .with_params(AnalysisParams::EventBased {
                    event_type: "anomaly".to_string(),
                    context_window_minutes: self.context_minutes,
                }),
            AnalysisKind::Comparative => {
                let comparison_start_time = self
                    .comparison_start
                    .context("--comparison-start is required for comparative analysis")?;
                let comparison_end_time = self
                    .comparison_end
                    .context("--comparison-end is required for comparative analysis")?;
                AnalysisRequest::time_window(self.patient.clone(), start, end).with_params(
                    AnalysisParams::Comparative {
                        comparison_start_time,
                        comparison_end_time,
                    },
                )
            }
        };

        Ok(if self.signals.is_empty() {
            request
        } else {
            request.with_signals(self.signals.clone())
        })
    }
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(args: &CliArgs) -> Result<SmartCareConfig> {
    let mut config = match &args.config {
        Some(path) => SmartCareConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SmartCareConfig::load()?.0,
    };
    if let Some(db) = &args.db {
        config.storage.path = db.clone();
    }
    Ok(config)
}

fn open_store(config: &SmartCareConfig) -> Result<Arc<SledReadingStore>> {
    if let Some(parent) = config.storage.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let store = SledReadingStore::open(&config.storage.path)
        .with_context(|| format!("opening reading store at {}", config.storage.path.display()))?;
    Ok(Arc::new(store))
}

/// The configured provider, or `None` when it is disabled or lacks credentials.
fn provider_or_fallback(config: &SmartCareConfig) -> Result<Option<Arc<dyn LlmProvider>>> {
    match build_provider(&config.llm) {
        Ok(provider) => Ok(provider),
        Err(LlmError::NotConfigured(reason)) => {
            warn!("LLM provider unavailable ({reason}); using deterministic analysis");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_ingest(config: &SmartCareConfig, batch_size: usize) -> Result<()> {
    let store = open_store(config)?;
    let cancel = CancellationToken::new();

    let shutdown_token = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, finishing ingest");
        shutdown_token.cancel();
    });

    let mut ingestor = Ingestor::new(store.clone()).with_batch_size(batch_size);
    let reader = tokio::io::BufReader::new(tokio::io::stdin());
    let stats = ingestor.run(reader, cancel).await?;
    store.flush()?;

    info!(
        total_readings = store.count()?,
        size_bytes = store.size_bytes(),
        "Reading store updated"
    );
    eprintln!("{stats}");
    Ok(())
}

async fn cmd_analyze(config: &SmartCareConfig, args: &AnalyzeArgs) -> Result<()> {
    let request = args.to_request()?;
    let store: Arc<dyn ReadingStore> = open_store(config)?;
    let provider = if args.no_llm { None } else { provider_or_fallback(config)? };

    let analyzer = TrendAnalyzer::from_config(store, provider, &config.llm);
    let result = analyzer.analyze(&request).await?;

    info!(
        kind = %result.analysis_type,
        generated_by = ?result.generated_by,
        data_points = result.data_points_analyzed,
        "Analysis complete"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_check_config(args: &CliArgs, probe_llm: bool) -> Result<()> {
    let config = load_config(args)?;
    config.validate()?;
    println!("Configuration OK");
    println!("  Patient:   {} ({})", config.device.patient_id, config.device.condition);
    println!("  Device:    {}", config.device.device_id);
    println!("  Store:     {}", config.storage.path.display());
    println!("  LLM:       {:?} ({})", config.llm.provider, config.llm.model);

    if probe_llm {
        match build_provider(&config.llm)? {
            Some(provider) => {
                provider.health_check().await?;
                println!("  Provider:  {} reachable", provider.provider_name());
            }
            None => println!("  Provider:  disabled"),
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    match &args.command {
        SubCommand::Ingest { batch_size } => {
            let config = load_config(&args)?;
            cmd_ingest(&config, *batch_size).await
        }
        SubCommand::Analyze(analyze) => {
            let config = load_config(&args)?;
            cmd_analyze(&config, analyze).await
        }
        SubCommand::CheckConfig { probe_llm } => cmd_check_config(&args, *probe_llm).await,
    }
}
