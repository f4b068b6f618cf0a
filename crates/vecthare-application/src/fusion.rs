//! Hybrid fusion
//!
//! Combines a dense-similarity ranking with a sparse/keyword ranking.
//! Two algorithms: Reciprocal Rank Fusion and weighted linear combination.

use std::collections::HashMap;

use crate::results::{FusionRanks, ScoredResult, sort_by_score_desc};

/// Default RRF rank constant
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Reciprocal Rank Fusion over a dense and a text ranking.
///
/// For each document: `score = sum_i 1 / (k + rank_i)` with 1-based ranks.
/// Each document is emitted once, sorted by descending fused score, with its
/// input ranks preserved in `ranks`. Output scores lie in `(0, 1]`.
pub fn reciprocal_rank_fusion(
    vector_results: Vec<ScoredResult>,
    text_results: Vec<ScoredResult>,
    k: f32,
) -> Vec<ScoredResult> {
    let k = if k > 0.0 { k } else { DEFAULT_RRF_K };

    let mut fused: HashMap<u32, ScoredResult> = HashMap::new();
    let mut order: Vec<u32> = Vec::new();

    for (rank0, result) in vector_results.into_iter().enumerate() {
        let rank = rank0 + 1;
        let entry = fused.entry(result.hash).or_insert_with(|| {
            order.push(result.hash);
            let mut r = result;
            r.score = 0.0;
            r
        });
        entry.score += 1.0 / (k + rank as f32);
        entry.ranks.get_or_insert_with(FusionRanks::default).vector = Some(rank);
    }

    for (rank0, result) in text_results.into_iter().enumerate() {
        let rank = rank0 + 1;
        let entry = fused.entry(result.hash).or_insert_with(|| {
            order.push(result.hash);
            let mut r = result;
            r.score = 0.0;
            r
        });
        entry.score += 1.0 / (k + rank as f32);
        entry.ranks.get_or_insert_with(FusionRanks::default).text = Some(rank);
    }

    let mut results: Vec<ScoredResult> = order
        .into_iter()
        .filter_map(|hash| fused.remove(&hash))
        .collect();
    sort_by_score_desc(&mut results);
    results
}

/// Weighted linear combination of a dense and a text ranking.
///
/// Min-max normalizes each list's scores into `[0, 1]`, then
/// `combined = w_v * vector + w_t * text`. A document missing from one list
/// contributes 0 for that component. Output is sorted descending with both
/// components attached; scores lie in `[0, 1]` for weights summing to 1.
pub fn weighted_combination(
    vector_results: Vec<ScoredResult>,
    text_results: Vec<ScoredResult>,
    vector_weight: f32,
    text_weight: f32,
) -> Vec<ScoredResult> {
    let vector_norm = normalize_scores(&vector_results);
    let text_norm = normalize_scores(&text_results);

    let mut fused: HashMap<u32, ScoredResult> = HashMap::new();
    let mut order: Vec<u32> = Vec::new();

    for ((rank0, result), norm) in vector_results.into_iter().enumerate().zip(vector_norm) {
        let entry = fused.entry(result.hash).or_insert_with(|| {
            order.push(result.hash);
            let mut r = result;
            r.score = 0.0;
            r
        });
        entry.vector_score = Some(norm);
        entry.ranks.get_or_insert_with(FusionRanks::default).vector = Some(rank0 + 1);
    }

    for ((rank0, result), norm) in text_results.into_iter().enumerate().zip(text_norm) {
        let entry = fused.entry(result.hash).or_insert_with(|| {
            order.push(result.hash);
            let mut r = result;
            r.score = 0.0;
            r
        });
        entry.bm25_score = Some(norm);
        entry.ranks.get_or_insert_with(FusionRanks::default).text = Some(rank0 + 1);
    }

    let mut results: Vec<ScoredResult> = order
        .into_iter()
        .filter_map(|hash| fused.remove(&hash))
        .collect();

    for result in &mut results {
        let v = result.vector_score.unwrap_or(0.0);
        let t = result.bm25_score.unwrap_or(0.0);
        let combined = vector_weight * v + text_weight * t;
        result.combined_score = Some(combined);
        result.score = combined;
    }

    sort_by_score_desc(&mut results);
    results
}

/// Min-max normalize a list's working scores to `[0, 1]`.
///
/// A constant (or single-element) list maps to 1.0 so the component keeps
/// its full weight.
fn normalize_scores(results: &[ScoredResult]) -> Vec<f32> {
    if results.is_empty() {
        return Vec::new();
    }
    let min = results.iter().map(|r| r.score).fold(f32::INFINITY, f32::min);
    let max = results
        .iter()
        .map(|r| r.score)
        .fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; results.len()];
    }
    results
        .iter()
        .map(|r| (r.score - min) / (max - min))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(hash: u32, score: f32) -> ScoredResult {
        ScoredResult::new(hash, score)
    }

    fn s1_inputs() -> (Vec<ScoredResult>, Vec<ScoredResult>) {
        let vector = vec![scored(1, 0.95), scored(2, 0.85), scored(3, 0.75)];
        let text = vec![scored(1, 8.5), scored(4, 7.2), scored(5, 5.8)];
        (vector, text)
    }

    #[test]
    fn rrf_puts_doubly_ranked_doc_first() {
        let (vector, text) = s1_inputs();
        let fused = reciprocal_rank_fusion(vector, text, 60.0);

        assert_eq!(fused.len(), 5);
        assert_eq!(fused[0].hash, 1, "doc1 appears in both lists at rank 1");
        for r in &fused {
            assert!(r.score > 0.0 && r.score <= 1.0, "score out of (0,1]: {}", r.score);
        }
        // doc1 carries both ranks
        let ranks = fused[0].ranks.unwrap();
        assert_eq!(ranks.vector, Some(1));
        assert_eq!(ranks.text, Some(1));
        // remaining docs ordered consistently with their single-list ranks:
        // rank-2 docs (2 and 4) before rank-3 docs (3 and 5)
        let position = |hash: u32| fused.iter().position(|r| r.hash == hash).unwrap();
        assert!(position(2) < position(3));
        assert!(position(4) < position(5));
    }

    #[test]
    fn rrf_never_ranks_multi_list_doc_below_single_list_peer() {
        // Same rank in one list; the doc also present in the other list must
        // score at least as high
        let vector = vec![scored(1, 0.9), scored(2, 0.8)];
        let text = vec![scored(2, 5.0)];
        let fused = reciprocal_rank_fusion(vector, text, 60.0);
        let doc1 = fused.iter().find(|r| r.hash == 1).unwrap();
        let doc2 = fused.iter().find(|r| r.hash == 2).unwrap();
        assert!(doc2.score > doc1.score);
    }

    #[test]
    fn rrf_with_empty_text_list_keeps_dense_order() {
        let vector = vec![scored(1, 0.9), scored(2, 0.8), scored(3, 0.7)];
        let fused = reciprocal_rank_fusion(vector, Vec::new(), 60.0);
        let hashes: Vec<u32> = fused.iter().map(|r| r.hash).collect();
        assert_eq!(hashes, vec![1, 2, 3]);
    }

    #[test]
    fn weighted_combination_attaches_components() {
        let (vector, text) = s1_inputs();
        let fused = weighted_combination(vector, text, 0.5, 0.5);

        assert_eq!(fused.len(), 5);
        for r in &fused {
            assert!(r.score >= 0.0 && r.score <= 1.0);
            assert!(r.combined_score.is_some());
        }
        // doc1 tops both normalized lists: combined = 0.5*1 + 0.5*1 = 1
        assert_eq!(fused[0].hash, 1);
        assert!((fused[0].score - 1.0).abs() < 1e-6);
        assert!(
            fused
                .windows(2)
                .all(|w| w[0].score >= w[1].score)
        );
    }

    #[test]
    fn weighted_combination_with_full_vector_weight_reproduces_dense_order() {
        let (vector, text) = s1_inputs();
        let dense_order: Vec<u32> = vector.iter().map(|r| r.hash).collect();
        let fused = weighted_combination(vector, text, 1.0, 0.0);
        let fused_dense: Vec<u32> = fused
            .iter()
            .filter(|r| r.vector_score.is_some())
            .map(|r| r.hash)
            .collect();
        assert_eq!(fused_dense, dense_order);
        // text-only docs collapse to zero
        for r in fused.iter().filter(|r| r.vector_score.is_none()) {
            assert_eq!(r.score, 0.0);
        }
    }

    #[test]
    fn empty_inputs_fuse_to_empty() {
        assert!(reciprocal_rank_fusion(Vec::new(), Vec::new(), 60.0).is_empty());
        assert!(weighted_combination(Vec::new(), Vec::new(), 0.5, 0.5).is_empty());
    }
}
