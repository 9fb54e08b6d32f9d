//! Common types and type aliases

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// A record as read from the source: a string-keyed mapping of field
/// names to JSON values
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Reserved output field for the canonical string form of the record id
pub const ID_STR_FIELD: &str = "_id_str";

/// Source-assigned identifier field on every record
pub const ID_FIELD: &str = "_id";

// ============================================================================
// RecordId
// ============================================================================

/// A 12-byte, totally-ordered record identifier assigned by the source.
///
/// Layout: 4-byte big-endian epoch seconds followed by an 8-byte big-endian
/// sequence number, so byte-wise comparison matches assignment order.
/// The canonical string form is 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId([u8; 12]);

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl RecordId {
    /// Create an id from raw bytes
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh id.
    ///
    /// Ids are strictly increasing within a process as long as the clock
    /// does not step backwards across a sequence rollover.
    pub fn generate() -> Self {
        let secs = chrono::Utc::now().timestamp() as u32;
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..].copy_from_slice(&seq.to_be_bytes());
        Self(bytes)
    }

    /// Parse the canonical 24-hex-character string form
    pub fn parse_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.len() != 24 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidRecordId {
                value: value.to_string(),
            });
        }

        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&value[i * 2..i * 2 + 2], 16).map_err(|_| {
                Error::InvalidRecordId {
                    value: value.to_string(),
                }
            })?;
        }
        Ok(Self(bytes))
    }

    /// Extract an id from a record field value (canonical string form)
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        value.as_str().and_then(|s| Self::parse_str(s).ok())
    }

    /// Canonical 24-character hex form
    pub fn to_hex(self) -> String {
        use fmt::Write as _;
        let mut out = String::with_capacity(24);
        for byte in self.0 {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Raw bytes
    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse_str(&value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_hex()
    }
}

// ============================================================================
// CursorState
// ============================================================================

/// Liveness of an open tailable cursor.
///
/// An invalidated cursor is an expected, recoverable event for a tailable
/// cursor over a capped collection, resolved by reopening from the latest
/// checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// The cursor is live and can yield more records
    Alive,
    /// The cursor was invalidated server-side and must be reopened
    Invalidated,
}

impl CursorState {
    /// Check if the cursor is still usable
    pub fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }
}

// ============================================================================
// Emission
// ============================================================================

/// The triple handed to the downstream event router.
///
/// Not retained by the engine after emission; delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    /// Routing label
    pub label: String,
    /// Epoch seconds
    pub timestamp: i64,
    /// Remaining record fields, with the id rewritten under `_id_str`
    pub payload: Document,
}

impl Emission {
    /// Create an emission
    pub fn new(label: impl Into<String>, timestamp: i64, payload: Document) -> Self {
        Self {
            label: label.into(),
            timestamp,
            payload,
        }
    }
}
