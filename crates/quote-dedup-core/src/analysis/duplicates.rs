use crate::error::Error;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::similarity::matcher::{quick_ratio, ratio, real_quick_ratio, Sequence};
use crate::storage::models::{Quote, QuoteId};
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Two quotes whose texts scored at or above the scan threshold.
/// `quote_a_id < quote_b_id` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePair {
    pub quote_a_id: QuoteId,
    pub quote_b_id: QuoteId,
    pub similarity: f64,
}

impl CandidatePair {
    fn new(first: QuoteId, second: QuoteId, similarity: f64) -> Self {
        let (quote_a_id, quote_b_id) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        Self {
            quote_a_id,
            quote_b_id,
            similarity,
        }
    }
}

/// Summary of one side of a pair, as shown to whoever picks the primary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSummary {
    pub id: QuoteId,
    pub text: String,
    pub author: String,
}

/// A candidate pair joined with both quotes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateEntry {
    pub quote1: QuoteSummary,
    pub quote2: QuoteSummary,
    pub similarity: f64,
}

pub fn validate_threshold(threshold: f64) -> Result<(), Error> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::InvalidArgument(format!(
            "threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

/// Find every unordered pair of quotes whose texts score at least `threshold`.
pub fn find_duplicates(quotes: &[Quote], threshold: f64) -> Result<Vec<CandidatePair>, Error> {
    find_duplicates_with(quotes, threshold, &AtomicBool::new(false), &SilentReporter)
}

/// Exhaustive pairwise scan with cancellation and progress reporting.
///
/// Pairs `(i, j)` with `i < j` in input order are compared as `ratio(text_i, text_j)`.
/// Two cheap upper bounds are checked first; a pair is only skipped when a bound
/// already falls below the threshold, so the result equals the unfiltered scan.
/// Output is in discovery order (by `i`, then `j`) regardless of thread scheduling.
/// Quotes are keyed by id: if an id repeats, only its first occurrence is scanned.
pub fn find_duplicates_with(
    quotes: &[Quote],
    threshold: f64,
    cancel: &AtomicBool,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<CandidatePair>, Error> {
    validate_threshold(threshold)?;

    let mut seen = AHashSet::with_capacity(quotes.len());
    let quotes: Vec<&Quote> = quotes.iter().filter(|q| seen.insert(q.id)).collect();
    let n = quotes.len();
    let total_pairs = (n as u64) * (n.saturating_sub(1) as u64) / 2;
    let start = Instant::now();
    reporter.on_scan_start(total_pairs);

    let sequences: Vec<Sequence> = quotes.par_iter().map(|q| Sequence::new(&q.text)).collect();
    let compared = AtomicU64::new(0);
    let full_comparisons = AtomicU64::new(0);

    let rows: Vec<Vec<CandidatePair>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut found = Vec::new();
            for j in (i + 1)..n {
                if cancel.load(Ordering::Relaxed) {
                    return Err(Error::Cancelled);
                }
                let (a, b) = (&sequences[i], &sequences[j]);
                if real_quick_ratio(a, b) < threshold || quick_ratio(a, b) < threshold {
                    continue;
                }
                full_comparisons.fetch_add(1, Ordering::Relaxed);
                let score = ratio(a, b);
                if score >= threshold {
                    found.push(CandidatePair::new(quotes[i].id, quotes[j].id, score));
                }
            }
            let row_len = (n - i - 1) as u64;
            let done = compared.fetch_add(row_len, Ordering::Relaxed) + row_len;
            reporter.on_scan_progress(done, total_pairs);
            Ok(found)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let pairs: Vec<CandidatePair> = rows.into_iter().flatten().collect();
    let duration = start.elapsed();

    debug!(
        "{} of {} pairs needed a full comparison",
        full_comparisons.load(Ordering::Relaxed),
        total_pairs
    );
    info!(
        "Duplicate scan over {} quotes found {} pairs (threshold={:.2}) in {:.2}s",
        n,
        pairs.len(),
        threshold,
        duration.as_secs_f64()
    );
    reporter.on_scan_complete(pairs.len(), duration.as_secs_f64());

    Ok(pairs)
}

/// Join pairs with the quotes they reference. Pairs whose quotes are not in
/// `quotes` (e.g. deleted since the scan) are dropped.
pub fn describe_pairs(quotes: &[Quote], pairs: &[CandidatePair]) -> Vec<DuplicateEntry> {
    let by_id: AHashMap<QuoteId, &Quote> = quotes.iter().map(|q| (q.id, q)).collect();
    let summary = |q: &Quote| QuoteSummary {
        id: q.id,
        text: q.text.clone(),
        author: q.author.clone(),
    };

    pairs
        .iter()
        .filter_map(|pair| {
            let a = *by_id.get(&pair.quote_a_id)?;
            let b = *by_id.get(&pair.quote_b_id)?;
            Some(DuplicateEntry {
                quote1: summary(a),
                quote2: summary(b),
                similarity: pair.similarity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::Language;

    fn quote(id: i64, text: &str) -> Quote {
        Quote {
            id: QuoteId(id),
            text: text.to_string(),
            author: "Anon".to_string(),
            language: Language::En,
            category: None,
            source: None,
            verified: false,
            sentiment: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let quotes = vec![quote(1, "a"), quote(2, "a")];
        for t in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                find_duplicates(&quotes, t),
                Err(Error::InvalidArgument(_))
            ));
        }
        assert!(find_duplicates(&[], 2.0).is_err());
    }

    #[test]
    fn test_empty_and_single_input() {
        assert!(find_duplicates(&[], 0.5).unwrap().is_empty());
        assert!(find_duplicates(&[quote(1, "x")], 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_threshold_zero_reports_every_pair_once() {
        let quotes = vec![quote(1, "abc"), quote(2, "xyz"), quote(3, "")];
        let pairs = find_duplicates(&quotes, 0.0).unwrap();
        let ids: Vec<(i64, i64)> = pairs
            .iter()
            .map(|p| (p.quote_a_id.0, p.quote_b_id.0))
            .collect();
        assert_eq!(ids, vec![(1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_ids_are_oriented_low_to_high() {
        let quotes = vec![quote(9, "Carpe diem."), quote(4, "Carpe diem")];
        let pairs = find_duplicates(&quotes, 0.9).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].quote_a_id, QuoteId(4));
        assert_eq!(pairs[0].quote_b_id, QuoteId(9));
    }

    #[test]
    fn test_repeated_id_never_pairs_with_itself() {
        let quotes = vec![quote(1, "same"), quote(1, "same")];
        assert!(find_duplicates(&quotes, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_id_reports_each_pair_once() {
        let quotes = vec![quote(1, "same"), quote(2, "same"), quote(1, "same")];
        let pairs = find_duplicates(&quotes, 0.0).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].quote_a_id, pairs[0].quote_b_id), (QuoteId(1), QuoteId(2)));
    }

    #[test]
    fn test_cancelled_scan() {
        let quotes = vec![quote(1, "a"), quote(2, "b")];
        let cancel = AtomicBool::new(true);
        let result = find_duplicates_with(&quotes, 0.5, &cancel, &SilentReporter);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_describe_pairs_drops_missing_quotes() {
        let quotes = vec![quote(1, "one"), quote(2, "one")];
        let pairs = vec![
            CandidatePair::new(QuoteId(1), QuoteId(2), 1.0),
            CandidatePair::new(QuoteId(1), QuoteId(3), 1.0),
        ];
        let entries = describe_pairs(&quotes, &pairs);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quote2.id, QuoteId(2));
    }

    #[test]
    fn test_duplicate_entry_json_shape() {
        let quotes = vec![quote(1, "Carpe diem"), quote(2, "Carpe diem.")];
        let pairs = find_duplicates(&quotes, 0.9).unwrap();
        let value = serde_json::to_value(describe_pairs(&quotes, &pairs)).unwrap();

        assert_eq!(value[0]["quote1"]["id"], 1);
        assert_eq!(value[0]["quote2"]["text"], "Carpe diem.");
        assert_eq!(value[0]["quote2"]["author"], "Anon");
        assert!(value[0]["similarity"].as_f64().unwrap() > 0.9);
    }
}
