use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    DuplicateScan,
    AutoMerge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    pub done: u64,
    pub total: u64,
    pub started_at: Instant,
    pub finished_at: Option<Instant>,
}

/// Tracks long-running work by handle.
///
/// Each registry owns its id counter and map; create one per engine (or share
/// one through an `Arc`) rather than reaching for a process-wide table.
/// A job is `Running` from `submit` until `complete` or `fail`; after that its
/// snapshot is frozen until `purge_finished` drops it.
#[derive(Debug)]
pub struct JobRegistry {
    next_id: AtomicU64,
    jobs: DashMap<JobId, JobSnapshot>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: DashMap::new(),
        }
    }

    pub fn submit(&self, kind: JobKind) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.jobs.insert(
            id,
            JobSnapshot {
                id,
                kind,
                state: JobState::Running,
                done: 0,
                total: 0,
                started_at: Instant::now(),
                finished_at: None,
            },
        );
        debug!("Submitted {} ({:?})", id, kind);
        id
    }

    pub fn update_progress(&self, id: JobId, done: u64, total: u64) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            if !job.state.is_terminal() {
                job.done = done;
                job.total = total;
            }
        }
    }

    pub fn complete(&self, id: JobId) {
        self.finish(id, JobState::Completed);
    }

    pub fn fail(&self, id: JobId, message: impl Into<String>) {
        self.finish(id, JobState::Failed(message.into()));
    }

    fn finish(&self, id: JobId, state: JobState) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            if job.state.is_terminal() {
                return;
            }
            debug!("{} finished: {:?}", id, state);
            job.state = state;
            job.finished_at = Some(Instant::now());
        }
    }

    pub fn get(&self, id: JobId) -> Option<JobSnapshot> {
        self.jobs.get(&id).map(|job| job.value().clone())
    }

    /// All tracked jobs, oldest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    /// Drop finished jobs older than `retention`. Running jobs are always kept.
    pub fn purge_finished(&self, retention: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| match job.finished_at {
            Some(finished) => finished.elapsed() < retention,
            None => true,
        });
        let purged = before.saturating_sub(self.jobs.len());
        if purged > 0 {
            debug!("Purged {} finished jobs", purged);
        }
        purged
    }
}
