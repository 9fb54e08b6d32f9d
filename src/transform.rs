//! Record transformer
//!
//! Pure mapping from a raw source record to the emission contract:
//! `(label, timestamp, payload, new_checkpoint)`. The input record is
//! immutable; the transformer builds a fresh payload with the designated
//! fields extracted and the id rewritten under `_id_str`. No deep
//! transformation of nested structures.

use crate::config::{LabelSource, TailConfig};
use crate::error::Result;
use crate::types::{Document, RecordId, ID_FIELD, ID_STR_FIELD};
use serde_json::Value;

/// The result of transforming one record
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    /// Routing label
    pub label: String,
    /// Epoch seconds
    pub timestamp: i64,
    /// Record with the designated fields removed/rewritten
    pub payload: Document,
    /// Id extracted from the record, when present and well-formed
    pub new_checkpoint: Option<RecordId>,
}

/// Maps raw records into emissions
#[derive(Debug, Clone)]
pub struct Transformer {
    label_source: LabelSource,
    time_key: Option<String>,
}

impl Transformer {
    /// Create a transformer
    pub fn new(label_source: LabelSource, time_key: Option<String>) -> Self {
        Self {
            label_source,
            time_key,
        }
    }

    /// Build a transformer from a validated config
    pub fn from_config(config: &TailConfig) -> Result<Self> {
        Ok(Self::new(config.label_source()?, config.time_key.clone()))
    }

    /// Transform one record.
    ///
    /// Field semantics:
    /// - time field absent or unconvertible falls back to "now"
    /// - tag field absent falls back to the configured fallback label
    /// - an absent id yields no checkpoint update; a malformed id still
    ///   passes its raw string through under `_id_str` but is not a
    ///   usable checkpoint
    pub fn transform(&self, record: &Document) -> TransformOutput {
        let mut payload = record.clone();

        let timestamp = match &self.time_key {
            Some(key) => payload
                .remove(key)
                .and_then(|v| to_epoch_seconds(&v))
                .unwrap_or_else(now),
            None => now(),
        };

        let label = match &self.label_source {
            LabelSource::Static(tag) => tag.clone(),
            LabelSource::Field { key, fallback } => payload
                .remove(key)
                .and_then(|v| to_label(&v))
                .unwrap_or_else(|| fallback.clone()),
        };

        let raw_id = payload.remove(ID_FIELD);
        let new_checkpoint = raw_id.as_ref().and_then(RecordId::from_value);
        match (&raw_id, new_checkpoint) {
            (_, Some(id)) => {
                payload.insert(ID_STR_FIELD.to_string(), Value::String(id.to_hex()));
            }
            (Some(value), None) => {
                payload.insert(ID_STR_FIELD.to_string(), Value::String(stringify(value)));
            }
            (None, None) => {}
        }

        TransformOutput {
            label,
            timestamp,
            payload,
            new_checkpoint,
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Convert a time field value to epoch seconds
fn to_epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.timestamp())
            }),
        _ => None,
    }
}

/// Convert a tag field value to a label
fn to_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
