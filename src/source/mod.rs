//! Source collection seam
//!
//! The engine is read-only against a named capped collection reachable
//! through an already-established connection. This module defines the
//! seam a driver implements: existence/capped-ness introspection, and
//! tailable, insertion-ordered cursors with an optional lower-bound
//! filter on the record id.
//!
//! [`MemoryCollection`] is the in-process reference implementation used
//! throughout the test suite.

mod memory;

pub use memory::MemoryCollection;

use crate::error::Result;
use crate::types::{CursorState, Document, RecordId};
use async_trait::async_trait;

/// A handle to a named collection on the source
#[async_trait]
pub trait SourceCollection: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// Whether the collection exists on the source
    async fn exists(&self) -> Result<bool>;

    /// Whether the collection is capped (insertion-ordered, tailable)
    async fn is_capped(&self) -> Result<bool>;

    /// Open a tailable cursor.
    ///
    /// With `resume_after` set, only records whose id sorts strictly
    /// greater are yielded; without it the cursor starts at the beginning
    /// of the collection as it currently stands. Records come back in the
    /// source's insertion order.
    async fn tail(&self, resume_after: Option<RecordId>) -> Result<Box<dyn TailCursor>>;
}

/// An open tailable cursor
#[async_trait]
pub trait TailCursor: Send {
    /// Fetch the next record.
    ///
    /// `Ok(None)` means the cursor has caught up to the live tail and the
    /// caller should wait before polling again; it is not an error and not
    /// end-of-stream. A server-side invalidation surfaces as
    /// [`crate::Error::CursorInvalidated`]; any other error is fatal to
    /// the caller.
    async fn try_next(&mut self) -> Result<Option<Document>>;

    /// Liveness of this cursor
    fn state(&self) -> CursorState;
}
