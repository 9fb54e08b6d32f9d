//! Downstream emit contract
//!
//! The engine hands each transformed record to an [`EventRouter`] as a
//! `(label, timestamp, payload)` triple. Delivery is fire-and-forget: the
//! router is expected to be synchronous and bounded, and the engine
//! consumes no return value.

use crate::types::{Document, Emission};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::error;

/// Accepts emissions from the tail engine
pub trait EventRouter: Send + Sync {
    /// Hand one event downstream
    fn emit(&self, label: &str, timestamp: i64, payload: Document);
}

// ============================================================================
// StdoutRouter
// ============================================================================

/// Writes each emission to stdout as one JSON object per line
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutRouter;

impl StdoutRouter {
    /// Create a stdout router
    pub fn new() -> Self {
        Self
    }
}

impl EventRouter for StdoutRouter {
    fn emit(&self, label: &str, timestamp: i64, payload: Document) {
        let event = Emission::new(label, timestamp, payload);
        match serde_json::to_string(&event) {
            Ok(line) => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                let _ = writeln!(handle, "{line}");
            }
            Err(e) => error!(label, error = %e, "failed to serialize emission"),
        }
    }
}

// ============================================================================
// MemoryRouter
// ============================================================================

/// Collects emissions in memory, mainly for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryRouter {
    emissions: Arc<Mutex<Vec<Emission>>>,
}

impl MemoryRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, in emission order
    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().expect("router lock poisoned").clone()
    }

    /// Number of events emitted so far
    pub fn len(&self) -> usize {
        self.emissions.lock().expect("router lock poisoned").len()
    }

    /// Whether nothing has been emitted yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventRouter for MemoryRouter {
    fn emit(&self, label: &str, timestamp: i64, payload: Document) {
        self.emissions
            .lock()
            .expect("router lock poisoned")
            .push(Emission::new(label, timestamp, payload));
    }
}
