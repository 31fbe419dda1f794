//! In-memory state of the run in progress.
//!
//! The controller records phase transitions here and the copy walk records
//! per-file counters. Nothing is persisted; the log is the durable record.

use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Controller state. Every run starts and ends in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Scanning,
    MountingSource,
    MountingDestination,
    Copying,
    Unmounting,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::MountingSource => "mounting-source",
            Self::MountingDestination => "mounting-destination",
            Self::Copying => "copying",
            Self::Unmounting => "unmounting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunProgress {
    pub phase: RunPhase,
    pub files_copied: u64,
    pub files_failed: u64,
    pub bytes_copied: u64,
}

/// Thread-safe view of the current run, shared via `AppContext`.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<RunProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RunProgress::default())),
        }
    }

    /// Reset counters for a new run, which starts in `Scanning`.
    pub async fn begin(&self) {
        *self.inner.write().await = RunProgress::default();
        self.set_phase(RunPhase::Scanning).await;
    }

    pub async fn set_phase(&self, phase: RunPhase) {
        let mut state = self.inner.write().await;
        if state.phase != phase {
            info!(phase = %phase, from = %state.phase, "Entering {} phase", phase);
            state.phase = phase;
        }
    }

    /// Back to `Idle`. Counters of the finished run stay readable.
    pub async fn finish(&self) {
        self.set_phase(RunPhase::Idle).await;
    }

    pub async fn snapshot(&self) -> RunProgress {
        self.inner.read().await.clone()
    }

    pub async fn phase(&self) -> RunPhase {
        self.inner.read().await.phase
    }

    /// Count one finished file. Called from the blocking copy walk.
    pub fn finish_file_blocking(&self, bytes: u64, copied: bool) {
        let mut state = self.inner.blocking_write();
        if copied {
            state.files_copied += 1;
            state.bytes_copied += bytes;
        } else {
            state.files_failed += 1;
        }
    }
}
