pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod import;
pub mod jobs;
pub mod progress;
pub mod similarity;
pub mod storage;

pub use analysis::duplicates::{find_duplicates, CandidatePair};
pub use analysis::merge::{merge_duplicates, MergeOutcome};
pub use config::AppConfig;
pub use engine::{AutoMergeReport, DedupEngine, ScanReport};
pub use error::Error;
pub use jobs::{JobId, JobRegistry, JobState};
pub use progress::{ProgressReporter, SilentReporter};
pub use storage::models::{Language, NewQuote, Quote, QuoteFilter, QuoteId, QuoteStatistics, Sentiment};
pub use storage::{Database, InMemoryQuoteStore, QuoteStore};
