//! Reading storage
//!
//! The analyzer reads through the [`ReadingStore`] trait so the backend can be
//! swapped: [`SledReadingStore`] for the CLI, [`MemoryStore`] for tests and
//! short-lived runs.

mod memory;
mod readings;

pub use memory::MemoryStore;
pub use readings::SledReadingStore;

use chrono::{DateTime, Utc};

use crate::types::{Reading, VitalSign};

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    DatabaseError(String),
    SerializationError(String),
    /// A lock was poisoned by a panicking writer
    Poisoned,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            StorageError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::Poisoned => write!(f, "Storage lock poisoned"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Pluggable reading persistence.
///
/// Implementations must be thread-safe; one store is shared by every
/// concurrent analysis.
pub trait ReadingStore: Send + Sync {
    /// Store readings; returns how many were written.
    fn insert(&self, readings: &[Reading]) -> Result<usize, StorageError>;

    /// Readings for `patient_id` with `start <= timestamp <= end`, oldest first.
    ///
    /// `signals = None` means every signal.
    fn fetch(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        signals: Option<&[VitalSign]>,
    ) -> Result<Vec<Reading>, StorageError>;

    /// Total number of stored readings
    fn count(&self) -> Result<usize, StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

pub(crate) fn wants(signals: Option<&[VitalSign]>, sign: VitalSign) -> bool {
    signals.map_or(true, |s| s.contains(&sign))
}
