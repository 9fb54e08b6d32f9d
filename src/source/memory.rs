//! In-memory capped collection
//!
//! Reference implementation of the source seam: a fixed-size,
//! insertion-ordered buffer that overwrites its oldest records when full
//! and supports tailable cursors. Used as the test double for the whole
//! engine; cursor invalidation can be injected to exercise the reopen
//! path.

use super::{SourceCollection, TailCursor};
use crate::error::{Error, Result};
use crate::types::{CursorState, Document, RecordId, ID_FIELD};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// An in-process capped collection with tailable cursors
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    exists: bool,
    capped: bool,
    shared: Arc<Mutex<Shared>>,
}

#[derive(Debug)]
struct Shared {
    records: VecDeque<(RecordId, Document)>,
    capacity: usize,
    /// Bumped by `invalidate_cursors`; cursors opened under an older epoch
    /// are dead
    epoch: u64,
    /// Total `try_next` calls across all cursors
    polls: u64,
}

impl MemoryCollection {
    /// Create a capped collection holding at most `capacity` records
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            exists: true,
            capped: true,
            shared: Arc::new(Mutex::new(Shared {
                records: VecDeque::new(),
                capacity,
                epoch: 0,
                polls: 0,
            })),
        }
    }

    /// Create a collection that reports itself as not capped
    pub fn uncapped(name: impl Into<String>) -> Self {
        let mut collection = Self::new(name, usize::MAX);
        collection.capped = false;
        collection
    }

    /// Create a handle to a collection that does not exist on the source
    pub fn missing(name: impl Into<String>) -> Self {
        let mut collection = Self::new(name, 0);
        collection.exists = false;
        collection
    }

    /// Append a record, assigning it a fresh id.
    ///
    /// The id is written into the record under `_id` in its canonical
    /// string form. The oldest record is dropped once the collection is
    /// at capacity. The id is generated under the lock, so the deque
    /// order always matches id order even with concurrent inserters.
    pub fn insert(&self, mut doc: Document) -> RecordId {
        let mut shared = self.shared.lock().expect("collection lock poisoned");
        let id = RecordId::generate();
        doc.insert(
            ID_FIELD.to_string(),
            serde_json::Value::String(id.to_hex()),
        );

        if shared.records.len() >= shared.capacity {
            shared.records.pop_front();
        }
        shared.records.push_back((id, doc));
        id
    }

    /// Append a record that carries no `_id` field at all
    pub fn insert_raw(&self, doc: Document) -> RecordId {
        let mut shared = self.shared.lock().expect("collection lock poisoned");
        let id = RecordId::generate();
        if shared.records.len() >= shared.capacity {
            shared.records.pop_front();
        }
        shared.records.push_back((id, doc));
        id
    }

    /// Invalidate every open cursor, as a server-side cursor timeout would
    pub fn invalidate_cursors(&self) {
        let mut shared = self.shared.lock().expect("collection lock poisoned");
        shared.epoch += 1;
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.shared
            .lock()
            .expect("collection lock poisoned")
            .records
            .len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total `try_next` calls observed across all cursors
    pub fn poll_count(&self) -> u64 {
        self.shared.lock().expect("collection lock poisoned").polls
    }
}

#[async_trait]
impl SourceCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.exists)
    }

    async fn is_capped(&self) -> Result<bool> {
        Ok(self.capped)
    }

    async fn tail(&self, resume_after: Option<RecordId>) -> Result<Box<dyn TailCursor>> {
        let epoch = self.shared.lock().expect("collection lock poisoned").epoch;
        Ok(Box::new(MemoryCursor {
            shared: Arc::clone(&self.shared),
            position: resume_after,
            epoch,
        }))
    }
}

/// Tailable cursor over a [`MemoryCollection`]
struct MemoryCursor {
    shared: Arc<Mutex<Shared>>,
    /// Highest id already yielded (or the resume point); only records
    /// sorting strictly greater come back
    position: Option<RecordId>,
    epoch: u64,
}

#[async_trait]
impl TailCursor for MemoryCursor {
    async fn try_next(&mut self) -> Result<Option<Document>> {
        let mut shared = self.shared.lock().expect("collection lock poisoned");
        shared.polls += 1;

        if shared.epoch != self.epoch {
            return Err(Error::cursor_invalidated("cursor epoch expired"));
        }

        let next = shared
            .records
            .iter()
            .find(|(id, _)| self.position.map_or(true, |pos| *id > pos))
            .map(|(id, doc)| (*id, doc.clone()));

        match next {
            Some((id, doc)) => {
                self.position = Some(id);
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn state(&self) -> CursorState {
        let shared = self.shared.lock().expect("collection lock poisoned");
        if shared.epoch == self.epoch {
            CursorState::Alive
        } else {
            CursorState::Invalidated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_tail_yields_in_insertion_order() {
        let collection = MemoryCollection::new("events", 100);
        collection.insert(doc(json!({"n": 1})));
        collection.insert(doc(json!({"n": 2})));
        collection.insert(doc(json!({"n": 3})));

        let mut cursor = collection.tail(None).await.unwrap();
        for expected in 1..=3 {
            let record = cursor.try_next().await.unwrap().unwrap();
            assert_eq!(record["n"], json!(expected));
        }
        assert!(cursor.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tail_sees_records_appended_after_open() {
        let collection = MemoryCollection::new("events", 100);
        let mut cursor = collection.tail(None).await.unwrap();
        assert!(cursor.try_next().await.unwrap().is_none());

        collection.insert(doc(json!({"n": 1})));
        let record = cursor.try_next().await.unwrap().unwrap();
        assert_eq!(record["n"], json!(1));
    }

    #[tokio::test]
    async fn test_resume_after_filters_strictly() {
        let collection = MemoryCollection::new("events", 100);
        collection.insert(doc(json!({"n": 1})));
        let second = collection.insert(doc(json!({"n": 2})));
        collection.insert(doc(json!({"n": 3})));

        let mut cursor = collection.tail(Some(second)).await.unwrap();
        let record = cursor.try_next().await.unwrap().unwrap();
        assert_eq!(record["n"], json!(3));
        assert!(cursor.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capped_overwrite_drops_oldest() {
        let collection = MemoryCollection::new("events", 2);
        collection.insert(doc(json!({"n": 1})));
        collection.insert(doc(json!({"n": 2})));
        collection.insert(doc(json!({"n": 3})));
        assert_eq!(collection.len(), 2);

        let mut cursor = collection.tail(None).await.unwrap();
        let record = cursor.try_next().await.unwrap().unwrap();
        assert_eq!(record["n"], json!(2));
    }

    #[tokio::test]
    async fn test_invalidation_kills_open_cursors() {
        let collection = MemoryCollection::new("events", 100);
        collection.insert(doc(json!({"n": 1})));

        let mut cursor = collection.tail(None).await.unwrap();
        assert!(cursor.state().is_alive());

        collection.invalidate_cursors();
        assert_eq!(cursor.state(), CursorState::Invalidated);

        let err = cursor.try_next().await.unwrap_err();
        assert!(err.is_cursor_invalidated());

        // A fresh cursor works fine
        let mut fresh = collection.tail(None).await.unwrap();
        assert!(fresh.try_next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_introspection_flags() {
        let capped = MemoryCollection::new("events", 10);
        assert!(capped.exists().await.unwrap());
        assert!(capped.is_capped().await.unwrap());
        assert_eq!(capped.name(), "events");

        let uncapped = MemoryCollection::uncapped("plain");
        assert!(uncapped.exists().await.unwrap());
        assert!(!uncapped.is_capped().await.unwrap());

        let missing = MemoryCollection::missing("ghost");
        assert!(!missing.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_keep_id_order() {
        let collection = MemoryCollection::new("events", 1000);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let collection = collection.clone();
                std::thread::spawn(move || {
                    for n in 0..50 {
                        collection.insert(doc(json!({"n": n})));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // A full scan sees every record, with ids strictly increasing in
        // deque order; an id assigned out of order would be skipped by the
        // `id > position` filter
        let mut cursor = collection.tail(None).await.unwrap();
        let mut last: Option<RecordId> = None;
        let mut seen = 0;
        while let Some(record) = cursor.try_next().await.unwrap() {
            let id = RecordId::parse_str(record[ID_FIELD].as_str().unwrap()).unwrap();
            if let Some(prev) = last {
                assert!(id > prev);
            }
            last = Some(id);
            seen += 1;
        }
        assert_eq!(seen, 200);
    }

    #[tokio::test]
    async fn test_insert_stamps_id_field() {
        let collection = MemoryCollection::new("events", 10);
        let id = collection.insert(doc(json!({"n": 1})));

        let mut cursor = collection.tail(None).await.unwrap();
        let record = cursor.try_next().await.unwrap().unwrap();
        assert_eq!(record[ID_FIELD], json!(id.to_hex()));
    }
}
