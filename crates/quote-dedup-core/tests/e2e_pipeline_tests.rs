use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

use quote_dedup_core::import::import_quotes;
use quote_dedup_core::jobs::JobState;
use quote_dedup_core::storage::QuoteStore;
use quote_dedup_core::{
    Database, DedupEngine, Error, JobRegistry, Language, ProgressReporter, QuoteId, SilentReporter,
};

const QUOTE_FILE: &str = "\
# daily quotes
\"Be the change you wish to see in the world.\" \u{2014} Gandhi
\"Be the change you wish to see in the world\" \u{2014} Gandhi
\"Be the change you wish to see in the world.\" \u{2014} Gandhi
\"Life is short.\" - Anon
\"Life is short!\" - Anon

this line has no quote marks
\"Stay hungry, stay foolish.\" \u{2013} Steve Jobs
";

fn open_engine(dir: &std::path::Path) -> DedupEngine<Database> {
    let db_path = dir.join("quotes_e2e.db");
    let db = Database::open(db_path.to_str().unwrap()).unwrap();
    DedupEngine::new(db, Arc::new(JobRegistry::new()))
}

/// Counts progress callbacks and optionally cancels the scan as soon as it starts.
struct RecordingReporter {
    cancel_on_start: Option<Arc<AtomicBool>>,
    progress_calls: AtomicU64,
    last_compared: AtomicU64,
}

impl RecordingReporter {
    fn new(cancel_on_start: Option<Arc<AtomicBool>>) -> Self {
        Self {
            cancel_on_start,
            progress_calls: AtomicU64::new(0),
            last_compared: AtomicU64::new(0),
        }
    }
}

impl ProgressReporter for RecordingReporter {
    fn on_scan_start(&self, _total_pairs: u64) {
        if let Some(token) = &self.cancel_on_start {
            token.store(true, Ordering::SeqCst);
        }
    }

    fn on_scan_progress(&self, compared: u64, _total_pairs: u64) {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        self.last_compared.fetch_max(compared, Ordering::SeqCst);
    }
}

#[test]
fn test_import_scan_merge_pipeline() {
    let tmp = tempdir().unwrap();
    let engine = open_engine(tmp.path());

    let summary =
        import_quotes(engine.store(), QUOTE_FILE, Language::En, Some("quotes.txt")).unwrap();
    assert_eq!(summary.imported, 5);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 1);

    let quotes = engine.store().list_all().unwrap();
    assert!(quotes.iter().all(|q| q.language == Language::En));
    assert!(quotes.iter().all(|q| q.source.as_deref() == Some("quotes.txt")));

    let reporter = RecordingReporter::new(None);
    let report = engine.find_duplicates(0.9, &reporter).unwrap();
    assert_eq!(report.quotes_scanned, 5);
    assert_eq!(reporter.last_compared.load(Ordering::SeqCst), 10);
    assert!(reporter.progress_calls.load(Ordering::SeqCst) > 0);

    let pair_ids: Vec<(QuoteId, QuoteId)> = report
        .pairs
        .iter()
        .map(|p| (p.quote_a_id, p.quote_b_id))
        .collect();
    assert!(pair_ids.contains(&(quotes[0].id, quotes[1].id)));
    assert!(pair_ids.contains(&(quotes[2].id, quotes[3].id)));
    assert!(report
        .pairs
        .iter()
        .all(|p| p.quote_a_id != quotes[4].id && p.quote_b_id != quotes[4].id));

    let job = engine.jobs().get(report.job_id).unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!((job.done, job.total), (10, 10));

    let outcome = engine
        .merge(quotes[0].id, &BTreeSet::from([quotes[1].id]))
        .unwrap();
    assert!(outcome.merged);
    assert_eq!(outcome.deleted, 1);

    // The merged pair is gone from the next scan; the other one remains.
    let rescan = engine.find_duplicates(0.9, &SilentReporter).unwrap();
    assert_eq!(rescan.pairs.len(), report.pairs.len() - 1);

    // Reopening the file sees the committed deletion.
    drop(engine);
    let db = Database::open(tmp.path().join("quotes_e2e.db").to_str().unwrap()).unwrap();
    assert_eq!(db.count_quotes().unwrap(), 4);
    assert!(db.get_quote(quotes[1].id).unwrap().is_none());
}

#[test]
fn test_reimport_skips_existing_quotes() {
    let tmp = tempdir().unwrap();
    let engine = open_engine(tmp.path());

    import_quotes(engine.store(), QUOTE_FILE, Language::Es, None).unwrap();
    let again = import_quotes(engine.store(), QUOTE_FILE, Language::Es, None).unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.skipped, 6);
    assert_eq!(engine.store().count_quotes().unwrap(), 5);
}

#[test]
fn test_auto_merge_keeps_oldest_quote_per_cluster() {
    let tmp = tempdir().unwrap();
    let engine = open_engine(tmp.path());
    import_quotes(engine.store(), QUOTE_FILE, Language::En, None).unwrap();
    let before = engine.store().list_all().unwrap();

    let report = engine.auto_merge(0.9, &SilentReporter).unwrap();
    assert_eq!(report.plans.len(), 2);
    assert_eq!(report.deleted, 2);

    let remaining: Vec<QuoteId> = engine
        .store()
        .list_all()
        .unwrap()
        .into_iter()
        .map(|q| q.id)
        .collect();
    assert_eq!(remaining, vec![before[0].id, before[2].id, before[4].id]);

    let job = engine.jobs().get(report.job_id).unwrap();
    assert_eq!(job.state, JobState::Completed);

    // Nothing left to merge.
    let second = engine.auto_merge(0.9, &SilentReporter).unwrap();
    assert!(second.plans.is_empty());
}

#[test]
fn test_cancelled_scan_marks_job_failed() {
    let tmp = tempdir().unwrap();
    let engine = open_engine(tmp.path());
    import_quotes(engine.store(), QUOTE_FILE, Language::En, None).unwrap();

    let reporter = RecordingReporter::new(Some(engine.cancel_token()));
    let err = engine.find_duplicates(0.5, &reporter).unwrap_err();
    assert!(matches!(err, Error::Cancelled));

    let jobs = engine.jobs().list();
    assert_eq!(jobs.len(), 1);
    assert!(matches!(jobs[0].state, JobState::Failed(_)));

    // The token is reset for the next scan.
    assert!(engine.find_duplicates(0.5, &SilentReporter).is_ok());
}

/// Holds the scan at its start until the cancel token is raised (or a timeout passes).
struct WaitForCancel {
    token: Arc<AtomicBool>,
}

impl ProgressReporter for WaitForCancel {
    fn on_scan_start(&self, _total_pairs: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.token.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }
}

#[test]
fn test_cancel_raised_once_job_is_running_stops_scan() {
    let tmp = tempdir().unwrap();
    let engine = open_engine(tmp.path());
    import_quotes(engine.store(), QUOTE_FILE, Language::En, None).unwrap();

    let jobs = Arc::clone(engine.jobs());
    let token = engine.cancel_token();
    let canceller = thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if jobs.list().iter().any(|job| job.state == JobState::Running) {
                token.store(true, Ordering::SeqCst);
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    });

    let reporter = WaitForCancel {
        token: engine.cancel_token(),
    };
    let err = engine.find_duplicates(0.5, &reporter).unwrap_err();
    assert!(canceller.join().unwrap());
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn test_invalid_threshold_fails_job() {
    let tmp = tempdir().unwrap();
    let engine = open_engine(tmp.path());

    let err = engine.find_duplicates(1.5, &SilentReporter).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(matches!(engine.jobs().list()[0].state, JobState::Failed(_)));
}

#[test]
fn test_merge_unknown_primary_reports_not_found() {
    let tmp = tempdir().unwrap();
    let engine = open_engine(tmp.path());
    import_quotes(engine.store(), QUOTE_FILE, Language::En, None).unwrap();

    let err = engine
        .merge(QuoteId(10_000), &BTreeSet::from([QuoteId(1), QuoteId(2)]))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(QuoteId(10_000))));
    assert_eq!(engine.store().count_quotes().unwrap(), 5);
}
