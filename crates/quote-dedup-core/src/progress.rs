/// Trait for reporting scan progress.
///
/// The CLI implements it with indicatif; the engine wraps it to feed the job registry.
/// All methods have default no-op implementations and may be called from rayon workers.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _total_pairs: u64) {}
    fn on_scan_progress(&self, _compared: u64, _total_pairs: u64) {}
    fn on_scan_complete(&self, _pairs_found: usize, _duration_secs: f64) {}
    fn on_merge_complete(&self, _deleted: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
