//! Snapshot, reconciliation and import execution.
//!
//! ```text
//! build_snapshot(account) ──→ Collection (target)
//!                                  │
//! backup file ──→ Collection (source)
//!                                  ↓
//!                       reconcile(target, source) ──→ Plan
//!                                                       ↓
//!                                       execute_plan / import_and_refresh
//! ```
//!
//! Reconciliation is additive only: it never removes tracks or playlists and
//! it ignores track order.

mod executor;
mod reconcile;
mod snapshot;

pub use executor::{CreatedPlaylist, ImportError, ImportReport, execute_plan, import_and_refresh};
pub use reconcile::{Plan, SkipReason, SkippedEntry, reconcile};
pub use snapshot::{SnapshotError, build_snapshot};

/// Progress of a long running snapshot or import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub step: String,
    pub playlists_done: usize,
    pub playlists_total: usize,
    pub tracks_done: usize,
    pub tracks_total: usize,
}

impl Progress {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ..Default::default()
        }
    }
}

/// Receives progress updates, e.g. a terminal spinner.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &Progress);
}

/// Discards progress.
impl ProgressSink for () {
    fn report(&self, _progress: &Progress) {}
}
