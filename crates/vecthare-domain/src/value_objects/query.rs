//! Query Value Objects
//!
//! Request and result shapes exchanged with the vector backends.

use serde::{Deserialize, Serialize};

use super::chunk::ChunkMetadata;
use crate::error::Error;

/// What to search with: raw text (embedded by the backend or caller) or a
/// ready-made dense vector.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// Search text; the caller or backend embeds it
    Text(String),
    /// Pre-computed query vector
    Vector(Vec<f32>),
}

impl QueryInput {
    /// The dense vector, if this input carries one
    pub fn vector(&self) -> Option<&[f32]> {
        match self {
            Self::Vector(v) => Some(v),
            Self::Text(_) => None,
        }
    }

    /// The raw text, if this input carries one
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Vector(_) => None,
        }
    }
}

/// A single-collection query
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Text or vector to search with
    pub input: QueryInput,
    /// Maximum results to return
    pub top_k: usize,
    /// Minimum similarity score; results below are dropped
    pub score_threshold: f32,
}

impl QueryRequest {
    /// Text query with the given shape
    pub fn text<S: Into<String>>(text: S, top_k: usize, score_threshold: f32) -> Self {
        Self {
            input: QueryInput::Text(text.into()),
            top_k,
            score_threshold,
        }
    }

    /// Vector query with the given shape
    pub fn vector(vector: Vec<f32>, top_k: usize, score_threshold: f32) -> Self {
        Self {
            input: QueryInput::Vector(vector),
            top_k,
            score_threshold,
        }
    }
}

/// Options for a backend-native hybrid query
#[derive(Debug, Clone)]
pub struct HybridOptions {
    /// Raw query text for the sparse/keyword leg
    pub text: String,
    /// Weight of the dense leg for weighted fusion
    pub vector_weight: f32,
    /// Weight of the sparse leg for weighted fusion
    pub text_weight: f32,
    /// RRF rank constant
    pub rrf_k: f32,
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            vector_weight: 0.7,
            text_weight: 0.3,
            rrf_k: 60.0,
        }
    }
}

/// One retrieved chunk with its similarity score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    /// Content hash of the chunk
    pub hash: u32,
    /// Similarity score, descending within a result set
    pub score: f32,
    /// Chunk text, when the backend stores it
    #[serde(default)]
    pub text: String,
    /// Stored metadata
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

/// Result of querying one collection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionQueryResult {
    /// Hashes of the retrieved chunks, score-descending
    pub hashes: Vec<u32>,
    /// Retrieved chunks with scores and metadata
    pub items: Vec<RetrievedChunk>,
    /// Whether a native hybrid path produced these results
    #[serde(default)]
    pub hybrid_search: bool,
}

impl CollectionQueryResult {
    /// Build a result from scored items, deriving the hash list
    pub fn from_items(items: Vec<RetrievedChunk>, hybrid_search: bool) -> Self {
        let hashes = items.iter().map(|i| i.hash).collect();
        Self {
            hashes,
            items,
            hybrid_search,
        }
    }
}

/// Per-collection outcome of a multi-collection query.
///
/// A single collection's failure never aborts the fan-out; the error is
/// carried here instead.
#[derive(Debug)]
pub enum CollectionQueryOutcome {
    /// The collection answered
    Ok(CollectionQueryResult),
    /// The collection failed; others proceeded
    Err(Error),
}

impl CollectionQueryOutcome {
    /// The result, if the collection answered
    pub fn ok(self) -> Option<CollectionQueryResult> {
        match self {
            Self::Ok(r) => Some(r),
            Self::Err(_) => None,
        }
    }

    /// Whether the collection answered
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// A scene boundary range used by scene-aware temporal weighting.
///
/// `end` is `None` for the still-open current scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneRange {
    /// First message index of the scene
    pub start: i64,
    /// Last message index, or `None` while the scene is open
    pub end: Option<i64>,
}
