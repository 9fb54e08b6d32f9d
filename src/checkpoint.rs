//! Checkpoint store
//!
//! Durable single-value store for the last record id handed downstream.
//! The backing file is opened read-write once at startup and the handle is
//! held for the whole run; every save rewrites the entire value in place
//! and flushes before returning, so a concurrent reader never observes a
//! partial id and a crash never loses an acknowledged save.
//!
//! Corruption is deliberately soft: an unreadable or malformed value only
//! forfeits resumption for this run, it never aborts startup.

use crate::error::{Error, Result};
use crate::types::RecordId;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed store for the last processed record id.
///
/// When no backing location is configured the store is a no-op and every
/// run starts from the live tail.
#[derive(Debug)]
pub struct CheckpointStore {
    inner: Option<Backing>,
    /// Last id handed to `save`, kept to refuse rollbacks
    last_saved: Option<RecordId>,
}

#[derive(Debug)]
struct Backing {
    path: PathBuf,
    file: File,
}

impl CheckpointStore {
    /// Create a disabled store: loads nothing, saves nothing
    pub fn disabled() -> Self {
        Self {
            inner: None,
            last_saved: None,
        }
    }

    /// Open the backing file, creating it if missing.
    ///
    /// The handle stays open until the store is dropped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| Error::checkpoint(format!("Failed to open {}: {e}", path.display())))?;

        debug!(path = %path.display(), "opened checkpoint store");
        Ok(Self {
            inner: Some(Backing { path, file }),
            last_saved: None,
        })
    }

    /// Open a store for the given optional location
    pub fn from_location(location: Option<&Path>) -> Result<Self> {
        match location {
            Some(path) => Self::open(path),
            None => Ok(Self::disabled()),
        }
    }

    /// Whether persistence is enabled
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// The backing path, if any
    pub fn path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|b| b.path.as_path())
    }

    /// Read the persisted id.
    ///
    /// Missing, empty, or unparsable content all mean "no checkpoint":
    /// the run proceeds as a cold start.
    pub fn load(&mut self) -> Option<RecordId> {
        let backing = self.inner.as_mut()?;

        let mut content = String::new();
        if let Err(e) = backing.file.rewind() {
            warn!(path = %backing.path.display(), error = %e, "failed to seek checkpoint file, starting cold");
            return None;
        }
        if let Err(e) = backing.file.read_to_string(&mut content) {
            warn!(path = %backing.path.display(), error = %e, "failed to read checkpoint file, starting cold");
            return None;
        }

        let content = content.trim();
        if content.is_empty() {
            debug!(path = %backing.path.display(), "checkpoint file empty, starting cold");
            return None;
        }

        match RecordId::parse_str(content) {
            Ok(id) => {
                debug!(path = %backing.path.display(), checkpoint = %id, "loaded checkpoint");
                self.last_saved = Some(id);
                Some(id)
            }
            Err(_) => {
                warn!(
                    path = %backing.path.display(),
                    value = content,
                    "checkpoint file corrupt, resumption forfeited for this run"
                );
                None
            }
        }
    }

    /// Persist the id, overwriting the previous value.
    ///
    /// The value is flushed to disk before this returns. Saving an id that
    /// sorts below the last saved one is refused: the persisted checkpoint
    /// is monotonically non-decreasing for the lifetime of the store.
    pub fn save(&mut self, id: RecordId) -> Result<()> {
        if let Some(last) = self.last_saved {
            if id < last {
                warn!(checkpoint = %id, last = %last, "refusing checkpoint rollback");
                return Ok(());
            }
        }

        let Some(backing) = self.inner.as_mut() else {
            return Ok(());
        };

        backing
            .file
            .rewind()
            .and_then(|()| backing.file.set_len(0))
            .and_then(|()| backing.file.write_all(id.to_hex().as_bytes()))
            .and_then(|()| backing.file.sync_data())
            .map_err(|e| {
                Error::checkpoint(format!(
                    "Failed to write {}: {e}",
                    backing.path.display()
                ))
            })?;

        self.last_saved = Some(id);
        Ok(())
    }

    /// The most recent id handed to `save`
    pub fn last_saved(&self) -> Option<RecordId> {
        self.last_saved
    }
}
