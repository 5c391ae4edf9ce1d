//! Wearable Vital-Sign Simulation
//!
//! Generates realistic wearable samples (heart rate, blood oxygen, activity)
//! as JSON lines on stdout. Two modes:
//! - Streaming: paced ticks at the configured sample rate, compressed by `--speed`
//! - Backfill: `--batch` with `--batch-size N` samples spread over the last `--backfill-hours`
//!
//! Logs go to stderr so stdout stays a clean sample stream.
//!
//! # Usage
//! ```bash
//! ./simulation --speed 60 --condition Tachycardia | ./smartcare ingest --db ./data/readings.db
//! ./simulation --batch --batch-size 2000 --backfill-hours 30 --devices 3 --seed 7 > history.jsonl
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use smartcare_insight::config::SmartCareConfig;
use smartcare_insight::simulator::{
    backfill_devices_parallel, DeviceSpec, EmitterStats, GeneratorKind, JsonLinesSink, SampleEmitter,
};
use smartcare_insight::types::HealthCondition;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "simulation")]
#[command(about = "Wearable vital-sign simulation for SmartCare Insight")]
#[command(version)]
struct Args {
    /// Config file (defaults to $SMARTCARE_CONFIG, then ./smartcare.toml)
    #[arg(short, long, env = "SMARTCARE_CONFIG")]
    config: Option<PathBuf>,

    /// Backfill history instead of streaming
    #[arg(long)]
    batch: bool,

    /// Samples per device in backfill mode
    #[arg(long)]
    batch_size: Option<usize>,

    /// Hours of history to backfill
    #[arg(long)]
    backfill_hours: Option<f64>,

    /// Number of simulated devices
    #[arg(long)]
    devices: Option<usize>,

    /// Signal model: enhanced or simple
    #[arg(short, long, default_value = "enhanced")]
    generator: GeneratorKind,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Health condition to simulate (e.g. hypoxia, tachycardia)
    #[arg(long)]
    condition: Option<HealthCondition>,

    /// Time compression factor in streaming mode (1 = real time)
    #[arg(short, long, default_value = "1", value_parser = parse_speed)]
    speed: f64,

    /// Stop streaming after this many samples per device
    #[arg(short, long)]
    limit: Option<u64>,

    /// Samples per minute
    #[arg(long)]
    sample_rate: Option<f64>,

    #[arg(long)]
    patient_id: Option<String>,

    #[arg(long)]
    device_id: Option<String>,

    /// Only log warnings
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Command-line values win over the config file.
    fn apply(&self, config: &mut SmartCareConfig) {
        if let Some(n) = self.batch_size {
            config.emitter.batch_size = n;
        }
        if let Some(h) = self.backfill_hours {
            config.emitter.backfill_hours = h;
        }
        if let Some(n) = self.devices {
            config.emitter.devices = n;
        }
        if let Some(seed) = self.seed {
            config.device.seed = Some(seed);
        }
        if let Some(c) = self.condition {
            config.device.condition = c;
        }
        if let Some(rate) = self.sample_rate {
            config.simulation.sample_rate = rate;
        }
        if let Some(id) = &self.patient_id {
            config.device.patient_id = id.clone();
        }
        if let Some(id) = &self.device_id {
            config.device.device_id = id.clone();
        }
    }
}

/// Speed must be a finite factor above zero.
fn parse_speed(s: &str) -> Result<f64, String> {
    let speed: f64 = s.parse().map_err(|e| format!("'{s}' is not a number: {e}"))?;
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err(format!("speed must be a finite value > 0 (got {s})"))
    }
}

fn load_config(args: &Args) -> Result<SmartCareConfig> {
    let mut config = match &args.config {
        Some(path) => SmartCareConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SmartCareConfig::load()?.0,
    };
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

// ============================================================================
// Modes
// ============================================================================

async fn run_backfill(args: &Args, config: &SmartCareConfig, specs: &[DeviceSpec]) -> Vec<EmitterStats> {
    let end = Utc::now();
    let batch_size = config.emitter.batch_size;
    let hours = config.emitter.backfill_hours;

    if let [spec] = specs {
        let source = spec.build_source(args.generator, config);
        let mut emitter = SampleEmitter::new(source, JsonLinesSink::new(std::io::stdout()), spec.device_id.clone());
        return vec![emitter.backfill(end, hours, batch_size).await];
    }

    info!(devices = specs.len(), samples = batch_size, hours, "[Simulation] Generating device histories in parallel");
    let batches = backfill_devices_parallel(specs, args.generator, config, end);

    let mut all = Vec::with_capacity(batches.len());
    for (spec, batch) in specs.iter().zip(&batches) {
        let source = spec.build_source(args.generator, config);
        let mut emitter = SampleEmitter::new(source, JsonLinesSink::new(std::io::stdout()), batch.device_id.clone());
        let stats = emitter.publish_batch(batch).await;
        info!(device = %batch.device_id, "[Simulation] {}", stats);
        all.push(stats);
    }
    all
}

async fn run_stream(args: &Args, config: &SmartCareConfig, specs: &[DeviceSpec]) -> Vec<EmitterStats> {
    let cancel = CancellationToken::new();

    let shutdown_token = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("[Simulation] Received Ctrl+C, stopping devices");
        shutdown_token.cancel();
    });

    let mut handles = Vec::with_capacity(specs.len());
    for spec in specs {
        let source = spec.build_source(args.generator, config);
        let mut emitter = SampleEmitter::new(source, JsonLinesSink::new(std::io::stdout()), spec.device_id.clone());
        let rate = config.simulation.sample_rate;
        let speed = args.speed;
        let limit = args.limit;
        let token = cancel.child_token();
        handles.push(tokio::spawn(async move { emitter.run(rate, speed, limit, token).await }));
    }

    let mut all = Vec::with_capacity(handles.len());
    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok(stats) => all.push(stats),
            Err(e) => warn!(error = %e, "[Simulation] Device task failed"),
        }
    }
    all
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    let specs = DeviceSpec::from_config(&config, config.emitter.devices);

    info!("{}", "=".repeat(60));
    info!("SMARTCARE WEARABLE SIMULATION");
    info!("  Mode:        {}", if args.batch { "backfill" } else { "streaming" });
    info!("  Generator:   {:?}", args.generator);
    info!("  Devices:     {}", specs.len());
    info!("  Condition:   {}", config.device.condition);
    info!("  Sample rate: {}/min", config.simulation.sample_rate);
    if let Some(seed) = config.device.seed {
        info!("  Seed:        {}", seed);
    }
    info!("{}", "=".repeat(60));

    let stats = if args.batch {
        run_backfill(&args, &config, &specs).await
    } else {
        run_stream(&args, &config, &specs).await
    };

    let published: u64 = stats.iter().map(|s| s.published).sum();
    let failed: u64 = stats.iter().map(|s| s.failed).sum();
    info!(published, failed, "[Simulation] Complete");
    if failed > 0 && published == 0 {
        anyhow::bail!("no samples could be written");
    }
    Ok(())
}
