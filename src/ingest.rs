//! Wire ingest
//!
//! Turns wire samples (one JSON object per line, as written by the
//! `simulation` binary) into stored [`Reading`]s. Each value is flagged
//! anomalous when it falls outside its signal's anomaly range. Device
//! metadata records are counted and skipped. Malformed lines are logged,
//! counted and skipped; they never abort a run.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::simulator::{SampleSink, SinkError};
use crate::storage::{ReadingStore, StorageError};
use crate::types::{DeviceMetadata, Reading, Sample, WireSample};

/// Readings buffered before a store write.
const DEFAULT_BATCH: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub samples: u64,
    pub readings: u64,
    pub anomalies: u64,
    pub metadata: u64,
    pub malformed: u64,
}

impl std::fmt::Display for IngestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ingest: {} lines, {} samples, {} readings ({} anomalous), {} metadata, {} malformed",
            self.lines, self.samples, self.readings, self.anomalies, self.metadata, self.malformed
        )
    }
}

/// Split one sample into per-signal readings, flagging anomalies.
pub fn readings_from_sample(patient_id: &str, device_id: &str, sample: &Sample) -> Vec<Reading> {
    sample
        .values
        .iter()
        .map(|(&sign, &value)| {
            Reading::new(sample.timestamp, sign, value, patient_id, device_id)
                .with_anomaly(sign.is_anomalous(value))
        })
        .collect()
}

pub struct Ingestor {
    store: Arc<dyn ReadingStore>,
    pending: Vec<Reading>,
    batch_size: usize,
    stats: IngestStats,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self {
            store,
            pending: Vec::with_capacity(DEFAULT_BATCH),
            batch_size: DEFAULT_BATCH,
            stats: IngestStats::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Ingest one parsed wire object.
    ///
    /// Only storage failures are errors; bad input is counted.
    pub fn ingest_value(&mut self, value: &Value) -> Result<(), StorageError> {
        if value.get("device_metadata").is_some() {
            self.stats.metadata += 1;
            debug!("[Ingest] Device metadata record skipped");
            return Ok(());
        }
        match Sample::from_wire(value) {
            Ok(wire) => self.accept(wire),
            Err(e) => {
                self.stats.malformed += 1;
                warn!(error = %e, "[Ingest] Skipping malformed sample");
                Ok(())
            }
        }
    }

    /// Ingest one text line; blank lines are ignored.
    pub fn ingest_line(&mut self, line: &str) -> Result<(), StorageError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.stats.lines += 1;
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.ingest_value(&value),
            Err(e) => {
                self.stats.malformed += 1;
                warn!(line = self.stats.lines, error = %e, "[Ingest] Skipping line that is not JSON");
                Ok(())
            }
        }
    }

    fn accept(&mut self, wire: WireSample) -> Result<(), StorageError> {
        let readings = readings_from_sample(&wire.patient_id, &wire.device_id, &wire.sample);
        self.stats.samples += 1;
        self.stats.anomalies += readings.iter().filter(|r| r.is_anomaly).count() as u64;
        self.pending.extend(readings);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write buffered readings to the store.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let written = self.store.insert(&self.pending)?;
        self.stats.readings += written as u64;
        self.pending.clear();
        Ok(())
    }

    /// Read lines until EOF or cancellation, then flush.
    pub async fn run<R: AsyncBufRead + Unpin>(
        &mut self,
        reader: R,
        cancel: CancellationToken,
    ) -> Result<IngestStats, StorageError> {
        let mut lines = reader.lines();
        info!(backend = self.store.backend_name(), "[Ingest] Reading wire samples");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[Ingest] Shutdown signal received");
                    break;
                }
                next = lines.next_line() => next,
            };
            match next {
                Ok(Some(line)) => self.ingest_line(&line)?,
                Ok(None) => break,
                Err(e) => {
                    // Invalid UTF-8 and similar; the reader cannot resync, so stop here
                    warn!(error = %e, "[Ingest] Input read failed; stopping");
                    break;
                }
            }
        }

        self.flush()?;
        info!("[Ingest] {}", self.stats);
        Ok(self.stats.clone())
    }
}

/// Lets an emitter write straight into a store.
#[async_trait]
impl SampleSink for Ingestor {
    async fn publish(&mut self, wire: &Value) -> Result<(), SinkError> {
        self.ingest_value(wire)?;
        Ok(())
    }

    async fn publish_metadata(&mut self, _metadata: &DeviceMetadata) -> Result<(), SinkError> {
        self.stats.metadata += 1;
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::VitalSign;
    use chrono::{TimeZone, Utc};

    const GOOD: &str = r#"{"patient_id":"p1","device_id":"d1","timestamp":"2025-05-26T12:00:00Z","hr":72,"oxygen":91.5,"activity":0.9}"#;

    #[test]
    fn test_anomaly_flags() {
        let store = Arc::new(MemoryStore::new());
        let mut ingestor = Ingestor::new(store.clone());
        ingestor.ingest_line(GOOD).unwrap();
        ingestor.flush().unwrap();

        let t = Utc.with_ymd_and_hms(2025, 5, 26, 12, 0, 0).unwrap();
        let got = store.fetch("p1", t, t, None).unwrap();
        assert_eq!(got.len(), 3);
        let flag = |s: VitalSign| got.iter().find(|r| r.signal == s).map(|r| r.is_anomaly);
        assert_eq!(flag(VitalSign::HeartRate), Some(false));
        assert_eq!(flag(VitalSign::Oxygen), Some(true));
        // Activity only flags outside the physical 0-1 scale
        assert_eq!(flag(VitalSign::Activity), Some(false));
        assert_eq!(ingestor.stats().anomalies, 1);
    }

    #[test]
    fn test_bad_lines_are_counted() {
        let mut ingestor = Ingestor::new(Arc::new(MemoryStore::new()));
        ingestor.ingest_line("not json").unwrap();
        ingestor.ingest_line(r#"{"device_id":"d1","timestamp":"2025-05-26T12:00:00Z","hr":70}"#).unwrap();
        ingestor.ingest_line(r#"{"device_metadata":{"device_id":"d1"}}"#).unwrap();
        ingestor.ingest_line("   ").unwrap();
        let stats = ingestor.stats();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.metadata, 1);
        assert_eq!(stats.samples, 0);
    }

    #[tokio::test]
    async fn test_run_reads_until_eof() {
        let input = format!("{GOOD}\ngarbage\n{GOOD}\n");
        let store = Arc::new(MemoryStore::new());
        let mut ingestor = Ingestor::new(store.clone()).with_batch_size(2);
        let stats = ingestor
            .run(input.as_bytes(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.readings, 6);
        assert_eq!(stats.malformed, 1);
        assert_eq!(store.count().unwrap(), 6);
    }
}
