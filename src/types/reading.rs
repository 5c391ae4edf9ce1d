//! Generator samples, stored readings and the flat JSON wire format

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{HealthCondition, VitalSign};

// ============================================================================
// Sample
// ============================================================================

/// One generator tick: a timestamp plus a value per active signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<VitalSign, f64>,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, sign: VitalSign) -> Option<f64> {
        self.values.get(&sign).copied()
    }

    /// Flat wire object: identity fields, RFC 3339 `Z` timestamp, one key per signal.
    pub fn to_wire(
        &self,
        patient_id: &str,
        device_id: &str,
        condition: HealthCondition,
    ) -> Value {
        let mut map = Map::new();
        map.insert("patient_id".into(), Value::from(patient_id));
        map.insert("device_id".into(), Value::from(device_id));
        map.insert(
            "timestamp".into(),
            Value::from(self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        for (sign, value) in &self.values {
            map.insert(sign.key().into(), Value::from(*value));
        }
        map.insert("condition".into(), Value::from(condition.name()));
        Value::Object(map)
    }

    /// Parse a flat wire object back into its sample and identity fields.
    ///
    /// Keys that are not identity fields or signal keys are ignored.
    pub fn from_wire(value: &Value) -> Result<WireSample, WireError> {
        let map = value.as_object().ok_or(WireError::NotAnObject)?;

        let patient_id = required_str(map, "patient_id")?;
        let device_id = required_str(map, "device_id")?;
        let timestamp = parse_timestamp(&required_str(map, "timestamp")?)?;

        let mut sample = Sample::new(timestamp);
        for sign in VitalSign::ALL {
            match map.get(sign.key()) {
                None | Some(Value::Null) => {}
                Some(v) => {
                    let value = v.as_f64().ok_or_else(|| WireError::InvalidValue {
                        key: sign.key(),
                        value: v.to_string(),
                    })?;
                    sample.values.insert(sign, value);
                }
            }
        }

        let condition = map
            .get("condition")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());

        Ok(WireSample {
            patient_id,
            device_id,
            condition,
            sample,
        })
    }

    /// Parse one JSON line of wire data.
    pub fn from_wire_str(line: &str) -> Result<WireSample, WireError> {
        let value: Value = serde_json::from_str(line)?;
        Self::from_wire(&value)
    }
}

fn required_str(map: &Map<String, Value>, key: &'static str) -> Result<String, WireError> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(WireError::MissingField(key)),
    }
}

/// RFC 3339 first; naive ISO timestamps are read as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, WireError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| WireError::InvalidTimestamp(raw.to_string()))
}

/// A sample decoded from the wire together with its identity fields.
#[derive(Debug, Clone, PartialEq)]
pub struct WireSample {
    pub patient_id: String,
    pub device_id: String,
    pub condition: Option<HealthCondition>,
    pub sample: Sample,
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("wire sample is not a JSON object")]
    NotAnObject,
    #[error("wire sample is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("non-numeric value for '{key}': {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Reading
// ============================================================================

/// A single stored measurement of one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub signal: VitalSign,
    pub value: f64,
    pub device_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub is_anomaly: bool,
}

impl Reading {
    pub fn new(
        timestamp: DateTime<Utc>,
        signal: VitalSign,
        value: f64,
        patient_id: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            signal,
            value,
            device_id: device_id.into(),
            patient_id: patient_id.into(),
            is_anomaly: false,
        }
    }

    pub fn with_anomaly(mut self, is_anomaly: bool) -> Self {
        self.is_anomaly = is_anomaly;
        self
    }
}

// ============================================================================
// Device Metadata
// ============================================================================

pub const DEVICE_MODEL: &str = "Simulated Wearable v1.0";
pub const DEVICE_FIRMWARE: &str = "1.0.0";

/// Record published once per device before its first sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub device_id: String,
    pub patient_id: String,
    pub device_type: String,
    pub model: String,
    pub firmware_version: String,
    pub capabilities: Vec<VitalSign>,
    pub condition: HealthCondition,
}

impl DeviceMetadata {
    pub fn simulated(
        patient_id: impl Into<String>,
        device_id: impl Into<String>,
        condition: HealthCondition,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            patient_id: patient_id.into(),
            device_type: "wearable".to_string(),
            model: DEVICE_MODEL.to_string(),
            firmware_version: DEVICE_FIRMWARE.to_string(),
            capabilities: VitalSign::ALL.to_vec(),
            condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Sample {
        let ts = Utc.with_ymd_and_hms(2025, 5, 26, 12, 0, 0).unwrap();
        let mut s = Sample::new(ts);
        s.values.insert(VitalSign::HeartRate, 72.0);
        s.values.insert(VitalSign::Oxygen, 97.4);
        s.values.insert(VitalSign::Activity, 0.35);
        s
    }

    #[test]
    fn test_wire_shape() {
        let wire = sample().to_wire("patient-1", "wearable-1", HealthCondition::Healthy);
        assert_eq!(wire["patient_id"], "patient-1");
        assert_eq!(wire["device_id"], "wearable-1");
        assert_eq!(wire["timestamp"], "2025-05-26T12:00:00Z");
        assert_eq!(wire["hr"], 72.0);
        assert_eq!(wire["condition"], "healthy");
        assert!(wire.get("glucose").is_none());
    }

    #[test]
    fn test_from_wire_recovers_sample() {
        let original = sample();
        let wire = original.to_wire("patient-1", "wearable-1", HealthCondition::Hypoxia);
        let decoded = Sample::from_wire(&wire).unwrap();
        assert_eq!(decoded.sample, original);
        assert_eq!(decoded.patient_id, "patient-1");
        assert_eq!(decoded.condition, Some(HealthCondition::Hypoxia));
    }

    #[test]
    fn test_from_wire_ignores_unknown_keys() {
        let line = r#"{"patient_id":"p","device_id":"d","timestamp":"2025-05-26T12:00:00Z","hr":80,"firmware":"x"}"#;
        let decoded = Sample::from_wire_str(line).unwrap();
        assert_eq!(decoded.sample.get(VitalSign::HeartRate), Some(80.0));
        assert_eq!(decoded.sample.values.len(), 1);
    }

    #[test]
    fn test_from_wire_missing_fields() {
        let no_patient = r#"{"device_id":"d","timestamp":"2025-05-26T12:00:00Z"}"#;
        assert!(matches!(
            Sample::from_wire_str(no_patient),
            Err(WireError::MissingField("patient_id"))
        ));
        let no_ts = r#"{"patient_id":"p","device_id":"d"}"#;
        assert!(matches!(
            Sample::from_wire_str(no_ts),
            Err(WireError::MissingField("timestamp"))
        ));
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let line = r#"{"patient_id":"p","device_id":"d","timestamp":"2025-05-26T12:00:00.500"}"#;
        let decoded = Sample::from_wire_str(line).unwrap();
        assert_eq!(decoded.sample.timestamp.timestamp_millis() % 1000, 500);
    }

    #[test]
    fn test_non_numeric_signal_is_rejected() {
        let line = r#"{"patient_id":"p","device_id":"d","timestamp":"2025-05-26T12:00:00Z","hr":"fast"}"#;
        assert!(matches!(
            Sample::from_wire_str(line),
            Err(WireError::InvalidValue { key: "hr", .. })
        ));
    }

    #[test]
    fn test_device_metadata_defaults() {
        let meta = DeviceMetadata::simulated("p", "d", HealthCondition::Healthy);
        assert_eq!(meta.device_type, "wearable");
        assert_eq!(meta.model, DEVICE_MODEL);
        assert_eq!(meta.capabilities.len(), 6);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["condition"], "healthy");
        assert_eq!(json["capabilities"][0], "hr");
    }
}
