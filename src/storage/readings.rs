//! Sled-backed reading store
//!
//! Key layout: `patient_id 0x00 | ts_ms (i64, sign-flipped, big-endian) | signal index | device_id`.
//! Keys sort by patient then time, so a patient's range is one contiguous scan.
//! Value: JSON-serialized [`Reading`].

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

use super::{wants, ReadingStore, StorageError};
use crate::types::{Reading, VitalSign};

/// Persistent reading history
#[derive(Clone)]
pub struct SledReadingStore {
    db: Arc<sled::Db>,
}

impl SledReadingStore {
    /// Open or create the store at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        tracing::info!("Reading store opened at {:?}", path_ref);
        Ok(Self { db: Arc::new(db) })
    }

    /// Temporary store removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Flush pending writes to disk.
    ///
    /// Inserts do not flush individually; callers flush once at the end of
    /// an ingest run.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

fn time_bytes(ts: DateTime<Utc>) -> [u8; 8] {
    // Flip the sign bit so pre-epoch times still sort before post-epoch ones
    ((ts.timestamp_millis() as u64) ^ (1 << 63)).to_be_bytes()
}

fn patient_prefix(patient_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(patient_id.len() + 18);
    key.extend_from_slice(patient_id.as_bytes());
    key.push(0);
    key
}

fn reading_key(r: &Reading) -> Vec<u8> {
    let mut key = patient_prefix(&r.patient_id);
    key.extend_from_slice(&time_bytes(r.timestamp));
    key.push(r.signal.index() as u8);
    key.extend_from_slice(r.device_id.as_bytes());
    key
}

impl ReadingStore for SledReadingStore {
    fn insert(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        let mut batch = sled::Batch::default();
        for r in readings {
            batch.insert(reading_key(r), serde_json::to_vec(r)?);
        }
        self.db.apply_batch(batch)?;
        Ok(readings.len())
    }

    fn fetch(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        signals: Option<&[VitalSign]>,
    ) -> Result<Vec<Reading>, StorageError> {
        if end < start {
            return Ok(Vec::new());
        }
        let mut lo = patient_prefix(patient_id);
        lo.extend_from_slice(&time_bytes(start));
        // Everything at `end` sorts below end_ms followed by 0xFF (signal index < 6)
        let mut hi = patient_prefix(patient_id);
        hi.extend_from_slice(&time_bytes(end));
        hi.push(u8::MAX);

        let mut out = Vec::new();
        for item in self.db.range(lo..hi) {
            let (_key, value) = item?;
            match serde_json::from_slice::<Reading>(&value) {
                Ok(r) if wants(signals, r.signal) && r.timestamp >= start && r.timestamp <= end => {
                    out.push(r);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping undecodable stored reading: {}", e),
            }
        }
        Ok(out)
    }

    fn count(&self) -> Result<usize, StorageError> {
        Ok(self.db.len())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 26, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_range_scan_by_patient() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledReadingStore::open(dir.path().join("readings.db")).unwrap();

        let mut readings = Vec::new();
        for m in 0..10 {
            readings.push(Reading::new(t0() + Duration::minutes(m), VitalSign::HeartRate, 70.0 + m as f64, "p1", "d1"));
            readings.push(Reading::new(t0() + Duration::minutes(m), VitalSign::HeartRate, 60.0, "p10", "d2"));
        }
        assert_eq!(store.insert(&readings).unwrap(), 20);

        let got = store
            .fetch("p1", t0() + Duration::minutes(2), t0() + Duration::minutes(5), None)
            .unwrap();
        let values: Vec<f64> = got.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![72.0, 73.0, 74.0, 75.0]);
        assert!(got.iter().all(|r| r.patient_id == "p1"));
    }

    #[test]
    fn test_same_instant_different_signals_are_kept() {
        let store = SledReadingStore::temporary().unwrap();
        store
            .insert(&[
                Reading::new(t0(), VitalSign::HeartRate, 70.0, "p1", "d1"),
                Reading::new(t0(), VitalSign::Oxygen, 97.0, "p1", "d1"),
                Reading::new(t0(), VitalSign::Oxygen, 96.0, "p1", "d2"),
            ])
            .unwrap();
        assert_eq!(store.count().unwrap(), 3);

        let oxygen = store.fetch("p1", t0(), t0(), Some(&[VitalSign::Oxygen])).unwrap();
        assert_eq!(oxygen.len(), 2);
    }

    #[test]
    fn test_pre_epoch_ordering() {
        let before = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert!(time_bytes(before) < time_bytes(t0()));
    }
}
