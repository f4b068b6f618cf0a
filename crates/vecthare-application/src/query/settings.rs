//! Retrieval settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use vecthare_domain::value_objects::{BackendKind, DecaySettings};

use crate::keywords::ExtractionLevel;
use crate::registry::{EmbeddingProviderConfig, VectorBackendConfig};

/// Hybrid fusion algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    /// Reciprocal Rank Fusion
    #[default]
    Rrf,
    /// Weighted linear combination
    Weighted,
}

/// How keyword signals enter the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordScoringMethod {
    /// Metadata keyword boost only
    Keyword,
    /// Local BM25 pass only
    Bm25,
    /// Both
    #[default]
    Hybrid,
}

/// Hybrid search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSettings {
    /// Whether hybrid search runs at all
    pub enabled: bool,
    /// Fusion algorithm for the local path
    pub fusion_method: FusionMethod,
    /// Dense weight for weighted fusion
    pub vector_weight: f32,
    /// Text weight for weighted fusion
    pub text_weight: f32,
    /// RRF rank constant
    pub rrf_k: f32,
    /// Prefer the backend's native hybrid path when it has one
    pub native_prefer: bool,
}

impl Default for HybridSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            fusion_method: FusionMethod::Rrf,
            vector_weight: 0.7,
            text_weight: 0.3,
            rrf_k: 60.0,
            native_prefer: true,
        }
    }
}

/// Keyword pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSettings {
    /// Scoring method
    pub scoring_method: KeywordScoringMethod,
    /// BM25 k1
    pub bm25_k1: f32,
    /// BM25 b
    pub bm25_b: f32,
    /// Extraction level for query-time use
    pub extraction_level: ExtractionLevel,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            scoring_method: KeywordScoringMethod::Hybrid,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            extraction_level: ExtractionLevel::Balanced,
        }
    }
}

/// World-info (lorebook) retrieval overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldInfoSettings {
    /// Vectorized lorebook collections participate in retrieval
    pub enabled: bool,
    /// Score threshold for lorebook entries
    pub threshold: f32,
    /// Result cap for lorebook entries
    pub top_k: usize,
    /// Messages scanned when querying lorebook collections
    pub query_depth: usize,
}

impl Default for WorldInfoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.3,
            top_k: 5,
            query_depth: 2,
        }
    }
}

/// Everything the orchestrator needs for one retrieval pass
#[derive(Clone)]
pub struct RetrievalSettings {
    /// Default backend for collections without recorded lineage
    pub backend: BackendKind,
    /// Backend transport settings
    pub backend_config: VectorBackendConfig,
    /// Embedding source configuration
    pub embedding: EmbeddingProviderConfig,
    /// How many trailing messages form the search context
    pub query_messages: usize,
    /// Final result count after re-ranking
    pub top_k: usize,
    /// Maximum entries actually injected
    pub insert_count: usize,
    /// Chunks from the last N messages never surface
    pub protect: usize,
    /// Minimum similarity score
    pub score_threshold: f32,
    /// Hybrid search configuration
    pub hybrid: HybridSettings,
    /// Keyword pipeline configuration
    pub keyword: KeywordSettings,
    /// Temporal weighting defaults (collections may override)
    pub decay: DecaySettings,
    /// Lorebook participation and overrides
    pub world_info: WorldInfoSettings,
    /// Prefix for the injected payload
    pub rag_context: String,
    /// XML wrapper tag for the injected payload
    pub rag_xml_tag: Option<String>,
    /// Host injection position slot
    pub position: i32,
    /// Host injection depth
    pub depth: i32,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Standard,
            backend_config: VectorBackendConfig::default(),
            embedding: EmbeddingProviderConfig::default(),
            query_messages: 2,
            top_k: 10,
            insert_count: 5,
            protect: 5,
            score_threshold: 0.25,
            hybrid: HybridSettings::default(),
            keyword: KeywordSettings::default(),
            decay: DecaySettings::default(),
            world_info: WorldInfoSettings::default(),
            rag_context: "Past events:".to_string(),
            rag_xml_tag: None,
            position: 1,
            depth: 2,
            request_timeout: Duration::from_secs(30),
        }
    }
}
