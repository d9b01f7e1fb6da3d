use super::duplicates::CandidatePair;
use crate::error::Error;
use crate::storage::models::QuoteId;
use crate::storage::QuoteStore;
use ahash::AHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub merged: bool,
    /// Rows actually removed; ids that were already gone are not counted.
    #[serde(skip_serializing)]
    pub deleted: usize,
}

/// Collapse `duplicates` into `primary` by deleting them.
///
/// The primary is never touched, even when it appears in `duplicates`.
/// Missing duplicate ids are ignored, so repeating a merge is harmless.
/// The primary check and the deletion share one store transaction: on error
/// nothing is removed, and a primary deleted by a concurrent merge is
/// reported as `NotFound`.
pub fn merge_duplicates<S>(
    store: &S,
    primary: QuoteId,
    duplicates: &BTreeSet<QuoteId>,
) -> Result<MergeOutcome, Error>
where
    S: QuoteStore + ?Sized,
{
    if duplicates.contains(&primary) {
        warn!("Quote {} listed as its own duplicate; keeping it", primary);
    }

    let deleted = store.delete_keeping(primary, duplicates)?;
    if deleted == 0 {
        debug!("Nothing to merge into quote {}", primary);
    } else {
        info!(
            "Merged into quote {}: deleted {} of {} duplicates",
            primary,
            deleted,
            duplicates.len()
        );
    }

    Ok(MergeOutcome {
        merged: true,
        deleted,
    })
}

/// One automatic merge decision: keep `primary`, delete `duplicates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    pub primary: QuoteId,
    pub duplicates: BTreeSet<QuoteId>,
}

/// Group candidate pairs into connected clusters and keep the oldest
/// (lowest id) quote of each cluster.
///
/// Clustering is transitive: if A~B and B~C then A, B and C collapse
/// together even when A and C scored below the threshold.
pub fn plan_merges(pairs: &[CandidatePair]) -> Vec<MergePlan> {
    let mut parent: AHashMap<QuoteId, QuoteId> = AHashMap::new();

    fn find(parent: &mut AHashMap<QuoteId, QuoteId>, id: QuoteId) -> QuoteId {
        let mut root = id;
        while let Some(&next) = parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }
        // Path compression
        let mut cur = id;
        while cur != root {
            let next = parent.get(&cur).copied().unwrap_or(root);
            parent.insert(cur, root);
            cur = next;
        }
        root
    }

    for pair in pairs {
        parent.entry(pair.quote_a_id).or_insert(pair.quote_a_id);
        parent.entry(pair.quote_b_id).or_insert(pair.quote_b_id);
        let ra = find(&mut parent, pair.quote_a_id);
        let rb = find(&mut parent, pair.quote_b_id);
        if ra != rb {
            // The smaller id stays the root so it ends up as the primary.
            let (keep, absorb) = if ra < rb { (ra, rb) } else { (rb, ra) };
            parent.insert(absorb, keep);
        }
    }

    let ids: Vec<QuoteId> = parent.keys().copied().collect();
    let mut clusters: BTreeMap<QuoteId, BTreeSet<QuoteId>> = BTreeMap::new();
    for id in ids {
        let root = find(&mut parent, id);
        if id != root {
            clusters.entry(root).or_default().insert(id);
        }
    }

    clusters
        .into_iter()
        .map(|(primary, duplicates)| MergePlan {
            primary,
            duplicates,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: i64, b: i64) -> CandidatePair {
        CandidatePair {
            quote_a_id: QuoteId(a),
            quote_b_id: QuoteId(b),
            similarity: 1.0,
        }
    }

    fn ids(values: &[i64]) -> BTreeSet<QuoteId> {
        values.iter().map(|&v| QuoteId(v)).collect()
    }

    #[test]
    fn test_plan_merges_clusters_transitively() {
        let plans = plan_merges(&[pair(2, 5), pair(5, 9), pair(3, 4)]);
        assert_eq!(
            plans,
            vec![
                MergePlan {
                    primary: QuoteId(2),
                    duplicates: ids(&[5, 9]),
                },
                MergePlan {
                    primary: QuoteId(3),
                    duplicates: ids(&[4]),
                },
            ]
        );
    }

    #[test]
    fn test_plan_merges_joins_clusters_through_a_late_pair() {
        let plans = plan_merges(&[pair(7, 8), pair(1, 2), pair(2, 8)]);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].primary, QuoteId(1));
        assert_eq!(plans[0].duplicates, ids(&[2, 7, 8]));
    }

    #[test]
    fn test_outcome_serializes_merged_flag_only() {
        let outcome = MergeOutcome {
            merged: true,
            deleted: 3,
        };
        assert_eq!(
            serde_json::to_value(outcome).unwrap(),
            serde_json::json!({ "merged": true })
        );
    }

    #[test]
    fn test_plan_merges_empty() {
        assert!(plan_merges(&[]).is_empty());
    }
}
