//! Reciprocal Rank Fusion (RRF) for combining ranked lists
//!
//! RRF is a simple but effective fusion method that:
//! - Doesn't require score normalization
//! - Works with any number of lists from any mix of retrievers
//! - Rewards documents that several lists agree on

use indexmap::IndexMap;
use lexroute_common::models::{Document, RankedList};

/// Rank damping constant
pub const RRF_K: f64 = 60.0;

/// Fused document with its accumulated score
#[derive(Debug, Clone, PartialEq)]
pub struct FusionResult {
    pub document: Document,
    pub rrf_score: f64,
}

/// Fuse ranked lists and keep the best `top_k` documents (all of them when `top_k` is 0)
pub fn fuse<I>(lists: I, top_k: usize) -> Vec<Document>
where
    I: IntoIterator<Item = RankedList>,
{
    fuse_scored(lists, top_k)
        .into_iter()
        .map(|result| result.document)
        .collect()
}

/// Fuse ranked lists, keeping scores.
///
/// Every document at 1-based rank `r` in a list contributes `1 / (60 + r)`;
/// contributions add up across lists. Ties keep first-seen order.
pub fn fuse_scored<I>(lists: I, top_k: usize) -> Vec<FusionResult>
where
    I: IntoIterator<Item = RankedList>,
{
    // Insertion order doubles as the tie-break
    let mut accumulator: IndexMap<Document, f64> = IndexMap::new();

    for list in lists {
        for (index, document) in list.into_iter().enumerate() {
            let contribution = 1.0 / (RRF_K + (index + 1) as f64);
            *accumulator.entry(document).or_insert(0.0) += contribution;
        }
    }

    let mut results: Vec<FusionResult> = accumulator
        .into_iter()
        .map(|(document, rrf_score)| FusionResult { document, rrf_score })
        .collect();

    // Stable sort so equal scores stay in first-seen order
    results.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score));

    if top_k > 0 {
        results.truncate(top_k);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(names: &[&str]) -> RankedList {
        names.iter().map(|name| Document::new(*name)).collect()
    }

    fn contents(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.content()).collect()
    }

    #[test]
    fn test_three_list_scenario() {
        let lists = vec![
            docs(&["five", "four", "three", "two"]),
            docs(&["one", "three", "two", "four"]),
            docs(&["four", "two", "one", "three"]),
        ];

        let fused = fuse(lists, 3);
        assert_eq!(contents(&fused), vec!["four", "three", "two"]);
    }

    #[test]
    fn test_score_is_sum_of_reciprocal_ranks() {
        let lists = vec![docs(&["a", "b"]), docs(&["b"])];
        let fused = fuse_scored(lists, 0);

        assert_eq!(fused[0].document.content(), "b");
        let expected_b = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((fused[0].rrf_score - expected_b).abs() < 1e-12);
        assert!((fused[1].rrf_score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_list_is_identity() {
        let list = docs(&["x", "y", "z"]);
        assert_eq!(fuse(vec![list.clone()], 0), list);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let lists = vec![docs(&["p", "q"]), docs(&["q", "p"])];
        assert_eq!(contents(&fuse(lists, 0)), vec!["p", "q"]);
    }

    #[test]
    fn test_top_k_boundaries() {
        let lists = vec![docs(&["a", "b", "c"]), docs(&["c", "d"])];

        assert_eq!(fuse(lists.clone(), 0).len(), 4);
        assert_eq!(fuse(lists.clone(), 10).len(), 4);
        assert_eq!(fuse(lists, 2).len(), 2);
        assert!(fuse(Vec::<RankedList>::new(), 3).is_empty());
    }

    #[test]
    fn test_metadata_is_part_of_identity() {
        let a1 = Document::new("Section 4").with_metadata("page", 1_i64);
        let a2 = Document::new("Section 4").with_metadata("page", 2_i64);

        let fused = fuse(vec![vec![a1.clone(), a2.clone()], vec![a1.clone()]], 0);
        assert_eq!(fused, vec![a1, a2]);
    }

    #[test]
    fn test_deterministic() {
        let lists = vec![docs(&["m", "n", "o"]), docs(&["o", "m"]), docs(&["n"])];
        assert_eq!(fuse(lists.clone(), 0), fuse(lists, 0));
    }
}
