//! Sample emitter: paced streaming and historical backfill
//!
//! The emitter owns one device's [`SampleSource`] and pushes every sample
//! into a [`SampleSink`]. Publish failures are logged and counted; they never
//! stop a run. Streaming ends on cancellation or after an optional sample
//! limit.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{secs, DeviceSpec, GeneratorKind, SampleSource};
use crate::config::defaults::BACKFILL_PROGRESS_MAX_INTERVAL;
use crate::config::SmartCareConfig;
use crate::storage::StorageError;
use crate::types::{DeviceMetadata, HealthCondition, Sample};

// ============================================================================
// Sink
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sink storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("sink rejected sample: {0}")]
    Rejected(String),
}

/// Transport-facing destination for emitted samples.
#[async_trait]
pub trait SampleSink: Send {
    /// Publish one sample in wire form.
    async fn publish(&mut self, wire: &Value) -> Result<(), SinkError>;

    /// Publish the device metadata record sent ahead of the first sample.
    async fn publish_metadata(&mut self, _metadata: &DeviceMetadata) -> Result<(), SinkError> {
        Ok(())
    }

    /// Human-readable name for logging.
    fn sink_name(&self) -> &str;
}

/// Writes one JSON object per line.
///
/// Metadata records are wrapped as `{"device_metadata": {...}}` so readers
/// can tell them apart from samples.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// One `write_all` per record so concurrent writers on a shared stdout
    /// never interleave partial lines.
    fn write_line<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> SampleSink for JsonLinesSink<W> {
    async fn publish(&mut self, wire: &Value) -> Result<(), SinkError> {
        self.write_line(wire)
    }

    async fn publish_metadata(&mut self, metadata: &DeviceMetadata) -> Result<(), SinkError> {
        self.write_line(&serde_json::json!({ "device_metadata": metadata }))
    }

    fn sink_name(&self) -> &str {
        "json-lines"
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub samples: Vec<Value>,
    pub metadata: Vec<DeviceMetadata>,
}

#[async_trait]
impl SampleSink for CollectingSink {
    async fn publish(&mut self, wire: &Value) -> Result<(), SinkError> {
        self.samples.push(wire.clone());
        Ok(())
    }

    async fn publish_metadata(&mut self, metadata: &DeviceMetadata) -> Result<(), SinkError> {
        self.metadata.push(metadata.clone());
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmitterStats {
    pub attempted: u64,
    pub published: u64,
    pub failed: u64,
    /// Simulated time covered by the emitted samples
    pub covered_hours: f64,
    /// Wall-clock duration of the run
    pub elapsed_secs: f64,
}

impl std::fmt::Display for EmitterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Emitter: {} samples ({} published, {} failed) covering {:.1}h in {:.2}s",
            self.attempted, self.published, self.failed, self.covered_hours, self.elapsed_secs
        )
    }
}

// ============================================================================
// Emitter
// ============================================================================

/// Drives one device's source into a sink.
pub struct SampleEmitter<G: SampleSource, S: SampleSink> {
    source: G,
    sink: S,
    device_id: String,
    metadata_sent: bool,
    stats: EmitterStats,
}

impl<G: SampleSource, S: SampleSink> SampleEmitter<G, S> {
    pub fn new(source: G, sink: S, device_id: impl Into<String>) -> Self {
        Self {
            source,
            sink,
            device_id: device_id.into(),
            metadata_sent: false,
            stats: EmitterStats::default(),
        }
    }

    pub fn stats(&self) -> &EmitterStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn metadata(&self) -> DeviceMetadata {
        DeviceMetadata::simulated(
            self.source.patient_id(),
            self.device_id.clone(),
            self.source.condition(),
        )
    }

    async fn ensure_metadata(&mut self) {
        if self.metadata_sent {
            return;
        }
        let meta = self.metadata();
        match self.sink.publish_metadata(&meta).await {
            Ok(()) => debug!(device = %self.device_id, "[Emitter] Device metadata published"),
            Err(e) => warn!(device = %self.device_id, error = %e, "[Emitter] Failed to publish device metadata"),
        }
        self.metadata_sent = true;
    }

    /// Publish one already-generated sample, counting the outcome.
    pub async fn publish_sample(&mut self, sample: &Sample) {
        self.ensure_metadata().await;
        self.stats.attempted += 1;
        let wire = sample.to_wire(self.source.patient_id(), &self.device_id, self.source.condition());
        match self.sink.publish(&wire).await {
            Ok(()) => self.stats.published += 1,
            Err(e) => {
                self.stats.failed += 1;
                warn!(
                    device = %self.device_id,
                    timestamp = %sample.timestamp,
                    error = %e,
                    "[Emitter] Failed to publish sample"
                );
            }
        }
    }

    /// Stream samples at `sample_rate` per minute until cancelled or `limit` is reached.
    ///
    /// Simulated timestamps advance by `60/sample_rate` seconds per tick from
    /// now; `speed` compresses the real pacing (1.0 = real time).
    pub async fn run(
        &mut self,
        sample_rate: f64,
        speed: f64,
        limit: Option<u64>,
        cancel: CancellationToken,
    ) -> EmitterStats {
        let started = Instant::now();
        let sim_interval = 60.0 / sample_rate;
        let real_interval = Duration::from_secs_f64((sim_interval / speed.max(f64::EPSILON)).max(0.001));
        let start_ts = Utc::now();

        let mut ticker = tokio::time::interval(real_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            device = %self.device_id,
            sink = self.sink.sink_name(),
            sample_rate,
            speed,
            "[Emitter] Streaming started"
        );

        let mut tick: u64 = 0;
        loop {
            if limit.is_some_and(|l| tick >= l) {
                info!(device = %self.device_id, samples = tick, "[Emitter] Sample limit reached");
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(device = %self.device_id, "[Emitter] Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let ts = start_ts + secs(tick as f64 * sim_interval);
            let sample = self.source.next_sample(ts);
            self.publish_sample(&sample).await;
            tick += 1;
        }

        self.stats.covered_hours = tick as f64 * sim_interval / 3600.0;
        self.stats.elapsed_secs = started.elapsed().as_secs_f64();
        info!("[Emitter] {}", self.stats);
        self.stats.clone()
    }

    /// Emit `batch_size` samples evenly spaced over `[end - hours, end)`.
    pub async fn backfill(&mut self, end: DateTime<Utc>, hours: f64, batch_size: usize) -> EmitterStats {
        let started = Instant::now();
        let (start, step) = backfill_layout(end, hours, batch_size);
        let progress_every = progress_interval(batch_size);

        info!(
            device = %self.device_id,
            samples = batch_size,
            start = %start,
            end = %end,
            "[Emitter] Backfill started"
        );

        for i in 0..batch_size {
            let ts = start + step * i as i32;
            let sample = self.source.next_sample(ts);
            self.publish_sample(&sample).await;

            if (i + 1) % progress_every == 0 {
                info!(
                    device = %self.device_id,
                    "[Emitter] Backfill progress: {}/{} ({:.0}%)",
                    i + 1,
                    batch_size,
                    (i + 1) as f64 / batch_size as f64 * 100.0
                );
            }
        }

        self.stats.covered_hours = hours;
        self.stats.elapsed_secs = started.elapsed().as_secs_f64();
        info!("[Emitter] {}", self.stats);
        self.stats.clone()
    }

    /// Publish a pre-generated batch (see [`backfill_devices_parallel`]).
    pub async fn publish_batch(&mut self, batch: &DeviceBatch) -> EmitterStats {
        let started = Instant::now();
        for sample in &batch.samples {
            self.publish_sample(sample).await;
        }
        self.stats.covered_hours = batch.covered_hours;
        self.stats.elapsed_secs = started.elapsed().as_secs_f64();
        self.stats.clone()
    }
}

/// `(start, step)` for a backfill of `batch_size` samples ending at `end`.
pub fn backfill_layout(end: DateTime<Utc>, hours: f64, batch_size: usize) -> (DateTime<Utc>, ChronoDuration) {
    let span = secs(hours * 3600.0);
    let start = end.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let step_ms = span.num_milliseconds() / batch_size.max(1) as i64;
    (start, ChronoDuration::milliseconds(step_ms))
}

/// Progress is logged every `max(1, min(100, batch_size / 10))` samples.
pub fn progress_interval(batch_size: usize) -> usize {
    (batch_size / 10).clamp(1, BACKFILL_PROGRESS_MAX_INTERVAL)
}

// ============================================================================
// Parallel multi-device backfill
// ============================================================================

/// One device's generated backfill.
#[derive(Debug, Clone)]
pub struct DeviceBatch {
    pub patient_id: String,
    pub device_id: String,
    pub condition: HealthCondition,
    pub samples: Vec<Sample>,
    pub covered_hours: f64,
}

/// Generate independent backfills for several devices on the rayon pool.
///
/// Each device builds its own source from its spec, so nothing is shared
/// between workers.
pub fn backfill_devices_parallel(
    specs: &[DeviceSpec],
    kind: GeneratorKind,
    config: &SmartCareConfig,
    end: DateTime<Utc>,
) -> Vec<DeviceBatch> {
    let hours = config.emitter.backfill_hours;
    let batch_size = config.emitter.batch_size;
    let (start, step) = backfill_layout(end, hours, batch_size);

    specs
        .par_iter()
        .map(|spec| {
            let mut source = spec.build_source(kind, config);
            let samples = (0..batch_size)
                .map(|i| source.next_sample(start + step * i as i32))
                .collect();
            DeviceBatch {
                patient_id: spec.patient_id.clone(),
                device_id: spec.device_id.clone(),
                condition: source.condition(),
                samples,
                covered_hours: hours,
            }
        })
        .collect()
}
