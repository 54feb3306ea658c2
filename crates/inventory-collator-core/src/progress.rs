use crate::engine::ScanPhase;

/// Trait for reporting scan progress.
///
/// CLI implements it with indicatif progress bars; tests use [`SilentReporter`].
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_phase(&self, _phase: ScanPhase) {}
    fn on_mark_missing(&self, _marked: usize) {}
    fn on_file_processed(&self, _files_seen: u64, _relative_path: &str) {}
    fn on_walk_complete(&self, _files_seen: u64, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
