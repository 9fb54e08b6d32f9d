//! Cursor manager
//!
//! Produces a live, ordered sequence of new records starting strictly
//! after the current checkpoint, transparently recovering from cursor
//! invalidation. A stale tailable cursor is an expected event on a capped
//! collection; the manager swallows it, waits out an exponential backoff,
//! and reopens from the latest known position. Every other source error
//! propagates to the caller.

use crate::config::BackoffConfig;
use crate::error::Result;
use crate::source::{SourceCollection, TailCursor};
use crate::types::{Document, RecordId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Owns the tailable cursor and its reopen policy
pub struct CursorManager {
    collection: Arc<dyn SourceCollection>,
    cursor: Option<Box<dyn TailCursor>>,
    /// Latest known checkpoint; reopened cursors resume strictly after it
    resume_after: Option<RecordId>,
    backoff: ReopenBackoff,
    /// Delay owed before the next open attempt, set after a failure
    pending_delay: Option<Duration>,
    reopens: u64,
}

impl CursorManager {
    /// Create a manager over the given collection, resuming strictly
    /// after `resume_after` (cold start when `None`)
    pub fn new(collection: Arc<dyn SourceCollection>, resume_after: Option<RecordId>) -> Self {
        Self::with_backoff(collection, resume_after, BackoffConfig::default())
    }

    /// Create a manager with an explicit reopen backoff
    pub fn with_backoff(
        collection: Arc<dyn SourceCollection>,
        resume_after: Option<RecordId>,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            collection,
            cursor: None,
            resume_after,
            backoff: ReopenBackoff::new(backoff),
            pending_delay: None,
            reopens: 0,
        }
    }

    /// Open the initial cursor
    pub async fn open(&mut self) -> Result<()> {
        self.reopen().await
    }

    /// Record that a record with this id has been processed.
    ///
    /// Future reopens resume strictly after it, so an invalidation can
    /// never replay an already-processed record.
    pub fn advance(&mut self, id: RecordId) {
        self.resume_after = Some(id);
    }

    /// The current resume point
    pub fn resume_point(&self) -> Option<RecordId> {
        self.resume_after
    }

    /// Drop the current cursor so the next call reopens from the resume
    /// point. Used after a failed iteration to guarantee the in-flight
    /// record is re-observed.
    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// How many times the cursor has been reopened after the initial open
    pub fn reopen_count(&self) -> u64 {
        self.reopens.saturating_sub(1)
    }

    /// Fetch the next record.
    ///
    /// `Ok(None)` means no record was produced this round: either the
    /// cursor caught up to the live tail, or it died and a reopen was
    /// scheduled. The caller waits, then polls again. At most one reopen
    /// and one fetch happen per call, so the caller's stop flag is
    /// observed between rounds even while the cursor keeps dying.
    pub async fn next(&mut self) -> Result<Option<Document>> {
        let needs_reopen = self.cursor.as_ref().map_or(true, |c| !c.state().is_alive());
        if needs_reopen {
            self.reopen().await?;
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        match cursor.try_next().await {
            Ok(record) => {
                self.backoff.reset();
                Ok(record)
            }
            Err(e) if e.is_cursor_invalidated() => {
                warn!(
                    collection = self.collection.name(),
                    resume_after = ?self.resume_after.map(|id| id.to_hex()),
                    "tailable cursor invalidated, reopening"
                );
                self.cursor = None;
                self.pending_delay = Some(self.backoff.next_delay());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn reopen(&mut self) -> Result<()> {
        if let Some(delay) = self.pending_delay.take() {
            sleep(delay).await;
        }

        match self.collection.tail(self.resume_after).await {
            Ok(cursor) => {
                self.cursor = Some(cursor);
                self.reopens += 1;
                debug!(
                    collection = self.collection.name(),
                    resume_after = ?self.resume_after.map(|id| id.to_hex()),
                    "opened tailable cursor"
                );
                Ok(())
            }
            Err(e) => {
                // Owe a delay before the next attempt, then let the caller
                // decide whether this iteration is retried
                self.pending_delay = Some(self.backoff.next_delay());
                Err(e)
            }
        }
    }
}

/// Exponential backoff state for reopen attempts
struct ReopenBackoff {
    config: BackoffConfig,
    current: Option<Duration>,
}

impl ReopenBackoff {
    fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    /// The delay to apply before the next attempt, escalating on each call
    fn next_delay(&mut self) -> Duration {
        let delay = self
            .current
            .unwrap_or(Duration::from_millis(self.config.initial_ms));
        let max = Duration::from_millis(self.config.max_ms);
        self.current = Some(max.min(delay.mul_f64(self.config.multiplier)));
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::source::MemoryCollection;
    use crate::types::CursorState;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().unwrap().clone()
    }

    fn fast_backoff() -> BackoffConfig {
        BackoffConfig {
            initial_ms: 1,
            max_ms: 5,
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_next_reads_through() {
        let collection = Arc::new(MemoryCollection::new("events", 100));
        collection.insert(doc(json!({"n": 1})));
        collection.insert(doc(json!({"n": 2})));

        let mut manager = CursorManager::with_backoff(collection, None, fast_backoff());
        manager.open().await.unwrap();

        assert_eq!(manager.next().await.unwrap().unwrap()["n"], json!(1));
        assert_eq!(manager.next().await.unwrap().unwrap()["n"], json!(2));
        assert!(manager.next().await.unwrap().is_none());
        assert_eq!(manager.reopen_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidation_is_transparent() {
        let collection = Arc::new(MemoryCollection::new("events", 100));
        let ids: Vec<_> = (1..=4)
            .map(|n| collection.insert(doc(json!({"n": n}))))
            .collect();

        let mut manager =
            CursorManager::with_backoff(
                Arc::clone(&collection) as Arc<dyn SourceCollection>,
                None,
                fast_backoff(),
            );
        manager.open().await.unwrap();

        assert_eq!(manager.next().await.unwrap().unwrap()["n"], json!(1));
        manager.advance(ids[0]);
        assert_eq!(manager.next().await.unwrap().unwrap()["n"], json!(2));
        manager.advance(ids[1]);

        collection.invalidate_cursors();

        // Remaining records come through exactly once, no replay of 1 and 2
        assert_eq!(manager.next().await.unwrap().unwrap()["n"], json!(3));
        manager.advance(ids[2]);
        assert_eq!(manager.next().await.unwrap().unwrap()["n"], json!(4));
        manager.advance(ids[3]);
        assert!(manager.next().await.unwrap().is_none());
        assert_eq!(manager.reopen_count(), 1);
    }

    #[tokio::test]
    async fn test_resume_point_applied_on_open() {
        let collection = Arc::new(MemoryCollection::new("events", 100));
        collection.insert(doc(json!({"n": 1})));
        let second = collection.insert(doc(json!({"n": 2})));
        collection.insert(doc(json!({"n": 3})));

        let mut manager = CursorManager::with_backoff(collection, Some(second), fast_backoff());
        manager.open().await.unwrap();

        assert_eq!(manager.next().await.unwrap().unwrap()["n"], json!(3));
        assert!(manager.next().await.unwrap().is_none());
    }

    /// Collection whose cursors always fail with a non-invalidation error
    struct BrokenCollection;

    #[async_trait]
    impl SourceCollection for BrokenCollection {
        fn name(&self) -> &str {
            "broken"
        }

        async fn exists(&self) -> Result<bool> {
            Ok(true)
        }

        async fn is_capped(&self) -> Result<bool> {
            Ok(true)
        }

        async fn tail(&self, _resume_after: Option<RecordId>) -> Result<Box<dyn TailCursor>> {
            Ok(Box::new(BrokenCursor))
        }
    }

    struct BrokenCursor;

    #[async_trait]
    impl TailCursor for BrokenCursor {
        async fn try_next(&mut self) -> Result<Option<Document>> {
            Err(Error::source("connection reset by peer"))
        }

        fn state(&self) -> CursorState {
            CursorState::Alive
        }
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let mut manager =
            CursorManager::with_backoff(Arc::new(BrokenCollection), None, fast_backoff());
        manager.open().await.unwrap();

        let err = manager.next().await.unwrap_err();
        assert!(!err.is_cursor_invalidated());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_backoff_escalates_and_caps() {
        let mut backoff = ReopenBackoff::new(BackoffConfig {
            initial_ms: 100,
            max_ms: 350,
            multiplier: 2.0,
        });

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
