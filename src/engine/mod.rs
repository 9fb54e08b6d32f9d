//! Tail engine
//!
//! The lifecycle controller and its background polling loop.
//!
//! # Overview
//!
//! `TailEngine::start` validates the target collection, loads the
//! checkpoint, opens the initial cursor, and spawns exactly one worker
//! task. The worker drives cursor → transform → checkpoint persist →
//! downstream emit, strictly one record at a time; for every record the
//! checkpoint is persisted before the record is emitted, so a cursor
//! reopen can never replay an already-emitted record.
//!
//! Shutdown is cooperative: a stop flag checked at the top of every
//! iteration and after every idle sleep, so shutdown latency is bounded
//! by one record plus one wait interval.

mod types;

pub use types::{LifecycleState, TailStats};

use crate::checkpoint::CheckpointStore;
use crate::config::TailConfig;
use crate::cursor::CursorManager;
use crate::emit::EventRouter;
use crate::error::{Error, Result};
use crate::source::SourceCollection;
use crate::transform::Transformer;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The tail engine: owns the worker task and its start/stop semantics
pub struct TailEngine {
    config: TailConfig,
    collection: Arc<dyn SourceCollection>,
    router: Arc<dyn EventRouter>,
    state: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<TailStats>>,
}

impl TailEngine {
    /// Create an engine over a collection handle and a downstream router
    pub fn new(
        config: TailConfig,
        collection: Arc<dyn SourceCollection>,
        router: Arc<dyn EventRouter>,
    ) -> Self {
        Self {
            config,
            collection,
            router,
            state: Arc::new(AtomicU8::new(LifecycleState::Stopped as u8)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Validate the target, load the checkpoint, open the initial cursor,
    /// and spawn the polling loop.
    ///
    /// Any error here is fatal: the engine never enters `Running` against
    /// a missing or uncapped collection, since tailing one would silently
    /// no-op forever.
    pub async fn start(&mut self) -> Result<()> {
        if self.state() != LifecycleState::Stopped {
            return Err(Error::Other("tail engine is already running".to_string()));
        }

        self.config.validate()?;

        if !self.collection.exists().await? {
            return Err(Error::CollectionNotFound {
                collection: self.config.collection.clone(),
                node: self.config.node_string(),
            });
        }
        if !self.collection.is_capped().await? {
            return Err(Error::NotCapped {
                collection: self.config.collection.clone(),
                node: self.config.node_string(),
            });
        }

        let transformer = Transformer::from_config(&self.config)?;

        let mut store = CheckpointStore::from_location(self.config.checkpoint_location.as_deref())?;
        let resume = store.load();

        info!(
            collection = %self.config.collection,
            mode = if store.is_enabled() {
                "persistent"
            } else {
                "non-persistent"
            },
            resume_after = ?resume.map(|id| id.to_hex()),
            "starting tail engine"
        );

        let mut manager = CursorManager::with_backoff(
            Arc::clone(&self.collection),
            resume,
            self.config.backoff.clone(),
        );
        manager.open().await?;

        self.stop.store(false, Ordering::SeqCst);
        self.state
            .store(LifecycleState::Running as u8, Ordering::SeqCst);

        let worker = Worker {
            manager,
            transformer,
            store,
            router: Arc::clone(&self.router),
            stop: Arc::clone(&self.stop),
            wait_time: self.config.wait_time(),
            stats: TailStats::new(),
        };
        self.worker = Some(tokio::spawn(worker.run()));

        Ok(())
    }

    /// Request a stop and wait for the worker to drain.
    ///
    /// The worker finishes the in-flight record, persists the final
    /// checkpoint, and releases the checkpoint backing resource before
    /// this returns.
    pub async fn shutdown(&mut self) -> Result<TailStats> {
        let Some(handle) = self.worker.take() else {
            return Err(Error::Other("tail engine is not running".to_string()));
        };

        self.state
            .store(LifecycleState::Draining as u8, Ordering::SeqCst);
        self.stop.store(true, Ordering::SeqCst);

        let joined = handle.await;

        // The engine is stopped either way; a panicked worker must not
        // leave the state stuck at Draining
        self.state
            .store(LifecycleState::Stopped as u8, Ordering::SeqCst);

        let stats = joined.map_err(|e| Error::Other(format!("tail worker panicked: {e}")))?;

        info!(
            records = stats.records_emitted,
            checkpoint_saves = stats.checkpoint_saves,
            cursor_reopens = stats.cursor_reopens,
            errors = stats.errors,
            "tail engine stopped"
        );
        Ok(stats)
    }
}

/// One iteration's outcome
enum Step {
    /// A record was processed and emitted
    Processed,
    /// Caught up to the live tail
    Idle,
}

/// The background execution unit. Owns the cursor, the transformer, and
/// the checkpoint store for the whole run; nothing else touches them.
struct Worker {
    manager: CursorManager,
    transformer: Transformer,
    store: CheckpointStore,
    router: Arc<dyn EventRouter>,
    stop: Arc<AtomicBool>,
    wait_time: Duration,
    stats: TailStats,
}

impl Worker {
    async fn run(mut self) -> TailStats {
        let started = Instant::now();

        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            match self.step().await {
                Ok(Step::Processed) => {}
                Ok(Step::Idle) => {
                    tokio::time::sleep(self.wait_time).await;
                }
                Err(e) => {
                    error!(error = %e, "tail iteration failed, retrying");
                    self.stats.add_error();
                    // Force a reopen so the record whose checkpoint was
                    // not advanced is re-observed
                    self.manager.reset();
                    tokio::time::sleep(self.wait_time).await;
                }
            }
        }

        // Draining: persist the final checkpoint, then drop the store to
        // release the backing handle
        if self.store.is_enabled() {
            if let Some(id) = self.manager.resume_point() {
                if let Err(e) = self.store.save(id) {
                    error!(error = %e, "failed to persist final checkpoint");
                    self.stats.add_error();
                }
            }
        }

        self.stats.cursor_reopens = self.manager.reopen_count();
        self.stats.set_duration(started.elapsed().as_millis() as u64);
        self.stats
    }

    /// Process at most one record.
    ///
    /// Ordering invariant: the checkpoint for record N is persisted
    /// before record N is emitted, and both happen before record N+1 is
    /// read. On a checkpoint write failure the resume point is not
    /// advanced, so the record is re-observed instead of being dropped.
    async fn step(&mut self) -> Result<Step> {
        match self.manager.next().await? {
            Some(record) => {
                let out = self.transformer.transform(&record);

                if let Some(id) = out.new_checkpoint {
                    self.store.save(id)?;
                    if self.store.is_enabled() {
                        self.stats.add_checkpoint_save();
                    }
                    self.manager.advance(id);
                }

                self.router.emit(&out.label, out.timestamp, out.payload);
                self.stats.add_record();
                Ok(Step::Processed)
            }
            None => Ok(Step::Idle),
        }
    }
}
