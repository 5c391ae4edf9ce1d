//! In-memory reading store
//!
//! Thread-safe via `RwLock`. Not durable.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use super::{wants, ReadingStore, StorageError};
use crate::types::{Reading, VitalSign};

#[derive(Debug, Default)]
pub struct MemoryStore {
    by_patient: RwLock<HashMap<String, Vec<Reading>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `readings`.
    pub fn with_readings(readings: Vec<Reading>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.by_patient.write() {
            for r in readings {
                map.entry(r.patient_id.clone()).or_default().push(r);
            }
            for list in map.values_mut() {
                list.sort_by_key(|r| r.timestamp);
            }
        }
        store
    }
}

impl ReadingStore for MemoryStore {
    fn insert(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        let mut map = self.by_patient.write().map_err(|_| StorageError::Poisoned)?;
        for r in readings {
            let list = map.entry(r.patient_id.clone()).or_default();
            // Keep each list sorted; ingest is mostly in-order so this is an append
            let pos = list.partition_point(|x| x.timestamp <= r.timestamp);
            list.insert(pos, r.clone());
        }
        Ok(readings.len())
    }

    fn fetch(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        signals: Option<&[VitalSign]>,
    ) -> Result<Vec<Reading>, StorageError> {
        let map = self.by_patient.read().map_err(|_| StorageError::Poisoned)?;
        let Some(list) = map.get(patient_id) else {
            return Ok(Vec::new());
        };
        let from = list.partition_point(|r| r.timestamp < start);
        Ok(list[from..]
            .iter()
            .take_while(|r| r.timestamp <= end)
            .filter(|r| wants(signals, r.signal))
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<usize, StorageError> {
        let map = self.by_patient.read().map_err(|_| StorageError::Poisoned)?;
        Ok(map.values().map(Vec::len).sum())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
