//! Scored retrieval results
//!
//! The working unit of the ranking pipeline. Every stage (BM25 scoring,
//! fusion, keyword boosting, temporal weighting) reads and annotates the
//! same result shape, so the host sees exactly which component produced
//! each score.

use serde::{Deserialize, Serialize};

use vecthare_domain::value_objects::{ChunkMetadata, RetrievedChunk};

/// Ranks a document held in the fused input lists
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FusionRanks {
    /// 1-based rank in the dense list, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<usize>,
    /// 1-based rank in the text/keyword list, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<usize>,
}

/// One retrieval result flowing through the ranking pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoredResult {
    /// Content hash of the chunk
    pub hash: u32,
    /// Chunk text
    pub text: String,
    /// Current working score; later stages overwrite this
    pub score: f32,
    /// Logical collection the chunk came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Stored chunk metadata
    pub metadata: ChunkMetadata,

    /// Normalized dense similarity component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    /// Raw BM25 component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,
    /// Weighted combination of the components
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_score: Option<f32>,
    /// Multiplier applied by keyword boosting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_boost: Option<f32>,
    /// Input-list ranks preserved through fusion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranks: Option<FusionRanks>,

    /// Score before temporal weighting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_score: Option<f32>,
    /// Age in messages used for temporal weighting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_age: Option<i64>,
    /// Age after scene-aware adjustment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_age: Option<i64>,
    /// Whether decay changed the score
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub decay_applied: bool,
    /// Whether nostalgia changed the score
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nostalgia_applied: bool,
    /// Chunk was flagged immune to temporal weighting
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub temporally_blind: bool,
    /// Scene boundaries adjusted the age
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub scene_aware_decay: bool,
}

impl ScoredResult {
    /// Minimal result for tests and local construction
    pub fn new(hash: u32, score: f32) -> Self {
        Self {
            hash,
            score,
            ..Self::default()
        }
    }

    /// Build from a backend-retrieved chunk, tagging the source collection
    pub fn from_retrieved(chunk: RetrievedChunk, collection: &str) -> Self {
        Self {
            hash: chunk.hash,
            text: chunk.text,
            score: chunk.score,
            collection: Some(collection.to_string()),
            metadata: chunk.metadata,
            ..Self::default()
        }
    }
}

/// Sort results by working score, descending. NaN sorts last.
pub fn sort_by_score_desc(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
