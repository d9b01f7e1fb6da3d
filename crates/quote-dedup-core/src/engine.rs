use crate::analysis::duplicates::{self, CandidatePair};
use crate::analysis::merge::{self, MergeOutcome, MergePlan};
use crate::config::AppConfig;
use crate::error::Error;
use crate::jobs::{JobId, JobKind, JobRegistry};
use crate::progress::ProgressReporter;
use crate::storage::models::QuoteId;
use crate::storage::QuoteStore;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runs scans and merges against one store, tracking scans as jobs.
pub struct DedupEngine<S: QuoteStore> {
    store: S,
    jobs: Arc<JobRegistry>,
    cancel_token: Arc<AtomicBool>,
    job_retention: Duration,
}

#[derive(Debug)]
pub struct ScanReport {
    pub job_id: JobId,
    pub quotes_scanned: usize,
    pub pairs: Vec<CandidatePair>,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct AutoMergeReport {
    pub job_id: JobId,
    pub plans: Vec<(MergePlan, MergeOutcome)>,
    pub deleted: usize,
}

/// Forwards scan progress to the caller's reporter and mirrors it into the job registry.
struct JobProgress<'a> {
    jobs: &'a JobRegistry,
    job_id: JobId,
    inner: &'a dyn ProgressReporter,
}

impl ProgressReporter for JobProgress<'_> {
    fn on_scan_start(&self, total_pairs: u64) {
        self.jobs.update_progress(self.job_id, 0, total_pairs);
        self.inner.on_scan_start(total_pairs);
    }

    fn on_scan_progress(&self, compared: u64, total_pairs: u64) {
        self.jobs.update_progress(self.job_id, compared, total_pairs);
        self.inner.on_scan_progress(compared, total_pairs);
    }

    fn on_scan_complete(&self, pairs_found: usize, duration_secs: f64) {
        self.inner.on_scan_complete(pairs_found, duration_secs);
    }

    fn on_merge_complete(&self, deleted: usize) {
        self.inner.on_merge_complete(deleted);
    }
}

impl<S: QuoteStore> DedupEngine<S> {
    pub fn new(store: S, jobs: Arc<JobRegistry>) -> Self {
        Self {
            store,
            jobs,
            cancel_token: Arc::new(AtomicBool::new(false)),
            job_retention: Duration::from_secs(crate::config::DEFAULT_JOB_RETENTION_SECS),
        }
    }

    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.job_retention = Duration::from_secs(config.job_retention_secs);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    /// Setting the token stops a running scan between pair comparisons.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_token)
    }

    /// Scan the whole store for near-duplicates as a tracked job.
    ///
    /// The cancel token is cleared before the job is registered, so a cancel
    /// raised once the job is visible always stops this scan.
    pub fn find_duplicates(
        &self,
        threshold: f64,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanReport, Error> {
        self.cancel_token.store(false, Ordering::SeqCst);
        self.jobs.purge_finished(self.job_retention);
        let job_id = self.jobs.submit(JobKind::DuplicateScan);

        let result = self.run_scan(job_id, threshold, reporter);
        self.finish_job(job_id, &result);
        result
    }

    fn run_scan(
        &self,
        job_id: JobId,
        threshold: f64,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanReport, Error> {
        let start = Instant::now();

        let quotes = self.store.list_all()?;
        debug!("Loaded {} quotes for {}", quotes.len(), job_id);

        let progress = JobProgress {
            jobs: &self.jobs,
            job_id,
            inner: reporter,
        };
        let pairs =
            duplicates::find_duplicates_with(&quotes, threshold, &self.cancel_token, &progress)?;

        Ok(ScanReport {
            job_id,
            quotes_scanned: quotes.len(),
            pairs,
            duration: start.elapsed(),
        })
    }

    /// Keep `primary`, delete `duplicates` in one transaction.
    pub fn merge(
        &self,
        primary: QuoteId,
        duplicates: &BTreeSet<QuoteId>,
    ) -> Result<MergeOutcome, Error> {
        merge::merge_duplicates(&self.store, primary, duplicates)
    }

    /// Scan, cluster the pairs, and merge every cluster into its lowest id.
    /// Each cluster is its own transaction; a failure stops the run and
    /// leaves earlier clusters merged.
    pub fn auto_merge(
        &self,
        threshold: f64,
        reporter: &dyn ProgressReporter,
    ) -> Result<AutoMergeReport, Error> {
        let scan = self.find_duplicates(threshold, reporter)?;
        let plans = merge::plan_merges(&scan.pairs);

        let job_id = self.jobs.submit(JobKind::AutoMerge);
        let result = self.apply_plans(job_id, plans);
        self.finish_job(job_id, &result);

        let report = result?;
        reporter.on_merge_complete(report.deleted);
        Ok(report)
    }

    fn apply_plans(&self, job_id: JobId, plans: Vec<MergePlan>) -> Result<AutoMergeReport, Error> {
        let total = plans.len() as u64;
        let mut applied = Vec::with_capacity(plans.len());
        let mut deleted = 0;

        for (index, plan) in plans.into_iter().enumerate() {
            let outcome = self.merge(plan.primary, &plan.duplicates)?;
            deleted += outcome.deleted;
            applied.push((plan, outcome));
            self.jobs.update_progress(job_id, index as u64 + 1, total);
        }

        info!("Auto-merge applied {} plans, deleted {} quotes", applied.len(), deleted);
        Ok(AutoMergeReport {
            job_id,
            plans: applied,
            deleted,
        })
    }

    fn finish_job<T>(&self, job_id: JobId, result: &Result<T, Error>) {
        match result {
            Ok(_) => self.jobs.complete(job_id),
            Err(e) => self.jobs.fail(job_id, e.to_string()),
        }
    }
}
