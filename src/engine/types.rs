//! Engine types
//!
//! Lifecycle states and run statistics for the tail engine.

/// Lifecycle of the tail engine.
///
/// Transitions are `Stopped → Running → Draining → Stopped`. Draining
/// means the stop flag is set and the controller is waiting for the
/// worker to observe it and finish the in-flight record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// No worker task exists
    Stopped = 0,
    /// The worker task is polling the source
    Running = 1,
    /// Stop requested, waiting for the worker to exit
    Draining = 2,
}

impl LifecycleState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Statistics from a tail run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailStats {
    /// Records handed to the downstream router
    pub records_emitted: usize,
    /// Checkpoint values persisted
    pub checkpoint_saves: usize,
    /// Cursor reopens after the initial open
    pub cursor_reopens: u64,
    /// Failed polling iterations (retried, not fatal)
    pub errors: usize,
    /// Run duration in milliseconds
    pub duration_ms: u64,
}

impl TailStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an emitted record
    pub fn add_record(&mut self) {
        self.records_emitted += 1;
    }

    /// Count a persisted checkpoint
    pub fn add_checkpoint_save(&mut self) {
        self.checkpoint_saves += 1;
    }

    /// Count a failed iteration
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set the run duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
