//! # captail
//!
//! A resumable tail-read engine for capped collections.
//!
//! captail continuously follows the tail of an append-only, fixed-size
//! (capped) collection and republishes each newly appended record to a
//! downstream event router, exactly once per record per run, surviving
//! cursor death, process restarts, and transient connection loss.
//!
//! ## Features
//!
//! - **Checkpoint-aware resume**: persists the last processed record id
//!   and reopens strictly after it on restart
//! - **Transparent cursor recovery**: a stale tailable cursor is reopened
//!   with backoff, never surfaced as an error
//! - **Ordered, at-least-once delivery**: checkpoint persistence for a
//!   record happens before its emission, so a reopen never replays an
//!   already-emitted record
//! - **Bounded shutdown**: cooperative stop flag, latency bounded by one
//!   record plus one wait interval
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use captail::{MemoryCollection, MemoryRouter, TailConfig, TailEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> captail::Result<()> {
//!     let collection = Arc::new(MemoryCollection::new("events", 1024));
//!     let router = Arc::new(MemoryRouter::new());
//!
//!     let config = TailConfig::new("events", "app.events");
//!     let mut engine = TailEngine::new(config, collection, router);
//!
//!     engine.start().await?;
//!     // ... records appended to the collection flow downstream ...
//!     let stats = engine.shutdown().await?;
//!     println!("emitted {} records", stats.records_emitted);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  TailEngine (lifecycle)                      │
//! │        Stopped → Running → Draining → Stopped                │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ one worker task
//! ┌──────────────┬───────────────┴──────────┬───────────────────┐
//! │ CursorManager│    Transformer           │  CheckpointStore  │
//! ├──────────────┼──────────────────────────┼───────────────────┤
//! │ open/reopen  │ label / timestamp / id   │ load once         │
//! │ id > resume  │ extraction, `_id_str`    │ save before emit  │
//! │ backoff      │ missing-tag fallback     │ corrupt = cold    │
//! └──────────────┴──────────────────────────┴───────────────────┘
//!                                │
//!                    EventRouter::emit(label, ts, payload)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the crate
pub mod error;

/// Common types and type aliases
pub mod types;

/// Configuration and connection target
pub mod config;

/// Checkpoint persistence
pub mod checkpoint;

/// Source collection seam and in-memory implementation
pub mod source;

/// Cursor lifecycle and reopen policy
pub mod cursor;

/// Record transformation
pub mod transform;

/// Downstream emit contract
pub mod emit;

/// Tail loop and lifecycle controller
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use checkpoint::CheckpointStore;
pub use config::{ConnectionTarget, LabelSource, TailConfig, MISSING_TAG_LABEL};
pub use cursor::CursorManager;
pub use emit::{EventRouter, MemoryRouter, StdoutRouter};
pub use engine::{LifecycleState, TailEngine, TailStats};
pub use error::{Error, Result};
pub use source::{MemoryCollection, SourceCollection, TailCursor};
pub use transform::{TransformOutput, Transformer};
pub use types::{CursorState, Document, Emission, RecordId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
