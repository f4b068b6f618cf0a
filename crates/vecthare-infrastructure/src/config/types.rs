//! Settings types
//!
//! Every canonical configuration key of the retrieval substrate, with the
//! conversions into the typed configs the application layer consumes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vecthare_application::chunking::{ChunkerConfig, ChunkingStrategy};
use vecthare_application::keywords::ExtractionLevel;
use vecthare_application::query::{
    FusionMethod, HybridSettings, KeywordScoringMethod, KeywordSettings, RetrievalSettings,
    WorldInfoSettings,
};
use vecthare_application::registry::{
    CohereInputType, EmbeddingProviderConfig, EmbeddingTransport, GoogleApi, MilvusSettings,
    QdrantSettings, VectorBackendConfig,
};
use vecthare_application::sync::SyncConfig;
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::EmbeddingProvider;
use vecthare_domain::value_objects::{BackendKind, DecaySettings};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (e.g. "info", "vecthare=debug")
    pub level: String,
    /// Emit JSON instead of text
    pub json_format: bool,
    /// Optional log file; rotated daily
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_output: None,
        }
    }
}

/// The full settings surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VecthareSettings {
    /// Embedding provider
    pub source: String,
    /// Selected vector backend name (aliases accepted)
    pub vector_backend: String,

    // Per-provider models
    /// Model for the in-process transformer runtime
    pub transformers_model: Option<String>,
    /// Model for OpenAI
    pub openai_model: Option<String>,
    /// Model for TogetherAI
    pub togetherai_model: Option<String>,
    /// Model for Mistral
    pub mistral_model: Option<String>,
    /// Model for ElectronHub
    pub electronhub_model: Option<String>,
    /// Model for OpenRouter
    pub openrouter_model: Option<String>,
    /// Model for Cohere
    pub cohere_model: Option<String>,
    /// Model for Ollama
    pub ollama_model: Option<String>,
    /// Model for llama.cpp
    pub llamacpp_model: Option<String>,
    /// Model for vLLM
    pub vllm_model: Option<String>,
    /// Model for BananaBread
    pub bananabread_model: Option<String>,
    /// Model for KoboldCpp
    pub koboldcpp_model: Option<String>,
    /// Model for Google AI Studio
    pub makersuite_model: Option<String>,
    /// Model for Vertex AI
    pub vertexai_model: Option<String>,
    /// Model for NomicAI
    pub nomicai_model: Option<String>,
    /// Model for the extras server
    pub extras_model: Option<String>,

    // Embedding transport
    /// Provider API base URL
    pub api_url: Option<String>,
    /// Provider API key
    pub api_key: Option<String>,
    /// Extras server URL
    pub extras_url: Option<String>,
    /// Extras server key
    pub extras_key: Option<String>,
    /// Keep the Ollama model loaded between calls
    pub ollama_keep: bool,
    /// Google API discriminator
    pub google_api: Option<GoogleApi>,
    /// Vertex AI auth mode
    pub vertexai_auth_mode: Option<String>,
    /// Vertex AI region
    pub vertexai_region: Option<String>,
    /// Vertex AI express project ID
    pub vertexai_express_project_id: Option<String>,
    /// Cohere input type
    pub cohere_input_type: Option<CohereInputType>,

    // Host transport
    /// Host application API base URL
    pub host_url: Option<String>,
    /// Host plugin API base URL
    pub plugin_url: Option<String>,

    // Qdrant transport
    /// Full Qdrant URL; overrides host/port
    pub qdrant_url: Option<String>,
    /// Qdrant host
    pub qdrant_host: Option<String>,
    /// Qdrant port
    pub qdrant_port: Option<u16>,
    /// Qdrant API key
    pub qdrant_api_key: Option<String>,
    /// Use https when assembling from host/port
    pub qdrant_use_cloud: bool,
    /// Single shared collection with tenant filters
    pub qdrant_multitenancy: bool,

    // Milvus transport
    /// Milvus host
    pub milvus_host: Option<String>,
    /// Milvus port
    pub milvus_port: Option<u16>,
    /// Milvus username
    pub milvus_username: Option<String>,
    /// Milvus password
    pub milvus_password: Option<String>,
    /// Milvus auth token
    pub milvus_token: Option<String>,
    /// Full Milvus address; overrides host/port
    pub milvus_address: Option<String>,
    /// Pinned vector dimensions; skips probe discovery
    pub milvus_dimensions: Option<usize>,

    // Chunking
    /// Chat chunking strategy
    pub chunking_strategy: ChunkingStrategy,
    /// Messages per group for message_batch
    pub batch_size: usize,
    /// Target characters per adaptive chunk
    pub chunk_size: usize,

    // Retrieval shape
    /// Final result count
    pub top_k: usize,
    /// Trailing messages forming the search context
    pub query: usize,
    /// Chunks from the last N messages never surface
    pub protect: usize,
    /// Maximum entries injected
    pub insert: usize,
    /// Host injection depth
    pub depth: i32,
    /// Host injection position slot
    pub position: i32,
    /// Minimum similarity score
    pub score_threshold: f32,

    // Hybrid fusion
    /// Whether hybrid search runs
    pub hybrid_search_enabled: bool,
    /// Fusion algorithm
    pub hybrid_fusion_method: FusionMethod,
    /// Dense weight
    pub hybrid_vector_weight: f32,
    /// Text weight
    pub hybrid_text_weight: f32,
    /// RRF rank constant
    pub hybrid_rrf_k: f32,
    /// Prefer backend-native hybrid
    pub hybrid_native_prefer: bool,

    // Keyword pipeline
    /// Keyword scoring method
    pub keyword_scoring_method: KeywordScoringMethod,
    /// BM25 k1
    pub bm25_k1: f32,
    /// BM25 b
    pub bm25_b: f32,
    /// Extraction level
    pub keyword_extraction_level: ExtractionLevel,
    /// Minimum message length considered for chat keyword extraction
    pub min_chat_length: usize,
    /// Comma-separated custom stop-words
    pub custom_stopwords: String,

    // Temporal weighting
    /// Decay configuration
    pub temporal_decay: DecaySettings,

    // Injection wrapper
    /// Prefix for the injected payload
    pub rag_context: String,
    /// XML wrapper tag
    pub rag_xml_tag: Option<String>,

    // Throughput control
    /// Deduplication window in messages; 0 is unlimited
    pub deduplication_depth: usize,
    /// Backend calls allowed per window
    pub rate_limit_calls: u32,
    /// Rate-limit window in seconds
    pub rate_limit_interval: u64,

    // Lore activation
    /// Vectorized world-info participates in retrieval
    pub enabled_world_info: bool,
    /// Score threshold for world-info entries
    pub world_info_threshold: f32,
    /// Result cap for world-info entries
    pub world_info_top_k: usize,
    /// Messages scanned when querying world-info
    pub world_info_query_depth: usize,

    /// Logging configuration
    pub logging: LoggingSettings,
}

impl Default for VecthareSettings {
    fn default() -> Self {
        Self {
            source: "transformers".to_string(),
            vector_backend: "standard".to_string(),
            transformers_model: None,
            openai_model: None,
            togetherai_model: None,
            mistral_model: None,
            electronhub_model: None,
            openrouter_model: None,
            cohere_model: None,
            ollama_model: None,
            llamacpp_model: None,
            vllm_model: None,
            bananabread_model: None,
            koboldcpp_model: None,
            makersuite_model: None,
            vertexai_model: None,
            nomicai_model: None,
            extras_model: None,
            api_url: None,
            api_key: None,
            extras_url: None,
            extras_key: None,
            ollama_keep: false,
            google_api: None,
            vertexai_auth_mode: None,
            vertexai_region: None,
            vertexai_express_project_id: None,
            cohere_input_type: None,
            host_url: None,
            plugin_url: None,
            qdrant_url: None,
            qdrant_host: None,
            qdrant_port: None,
            qdrant_api_key: None,
            qdrant_use_cloud: false,
            qdrant_multitenancy: false,
            milvus_host: None,
            milvus_port: None,
            milvus_username: None,
            milvus_password: None,
            milvus_token: None,
            milvus_address: None,
            milvus_dimensions: None,
            chunking_strategy: ChunkingStrategy::PerMessage,
            batch_size: 5,
            chunk_size: 400,
            top_k: 10,
            query: 2,
            protect: 5,
            insert: 5,
            depth: 2,
            position: 1,
            score_threshold: 0.25,
            hybrid_search_enabled: false,
            hybrid_fusion_method: FusionMethod::Rrf,
            hybrid_vector_weight: 0.7,
            hybrid_text_weight: 0.3,
            hybrid_rrf_k: 60.0,
            hybrid_native_prefer: true,
            keyword_scoring_method: KeywordScoringMethod::Hybrid,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            keyword_extraction_level: ExtractionLevel::Balanced,
            min_chat_length: 0,
            custom_stopwords: String::new(),
            temporal_decay: DecaySettings::default(),
            rag_context: "Past events:".to_string(),
            rag_xml_tag: None,
            deduplication_depth: 0,
            rate_limit_calls: 5,
            rate_limit_interval: 60,
            enabled_world_info: false,
            world_info_threshold: 0.3,
            world_info_top_k: 5,
            world_info_query_depth: 2,
            logging: LoggingSettings::default(),
        }
    }
}

impl VecthareSettings {
    /// Model configured for a source
    pub fn model_for(&self, source: &str) -> Option<String> {
        let model = match source.to_ascii_lowercase().as_str() {
            "transformers" => &self.transformers_model,
            "openai" => &self.openai_model,
            "togetherai" => &self.togetherai_model,
            "mistral" => &self.mistral_model,
            "electronhub" => &self.electronhub_model,
            "openrouter" => &self.openrouter_model,
            "cohere" => &self.cohere_model,
            "ollama" => &self.ollama_model,
            "llamacpp" => &self.llamacpp_model,
            "vllm" => &self.vllm_model,
            "bananabread" => &self.bananabread_model,
            "koboldcpp" => &self.koboldcpp_model,
            "makersuite" => &self.makersuite_model,
            "vertexai" => &self.vertexai_model,
            "nomicai" => &self.nomicai_model,
            "extras" => &self.extras_model,
            _ => return None,
        };
        model.clone()
    }

    /// Normalized backend kind
    pub fn backend_kind(&self) -> Result<BackendKind> {
        BackendKind::normalize(&self.vector_backend)
    }

    /// Embedding configuration for the active source
    pub fn embedding_config(&self) -> EmbeddingProviderConfig {
        EmbeddingProviderConfig {
            source: self.source.clone(),
            model: self.model_for(&self.source),
            transport: EmbeddingTransport {
                api_url: self.api_url.clone(),
                api_key: self.api_key.clone(),
                extras_url: self.extras_url.clone(),
                extras_key: self.extras_key.clone(),
                keep: self.ollama_keep,
                google_api: self.google_api,
                vertexai_auth_mode: self.vertexai_auth_mode.clone(),
                vertexai_region: self.vertexai_region.clone(),
                vertexai_express_project_id: self.vertexai_express_project_id.clone(),
                input_type: self.cohere_input_type,
            },
        }
    }

    /// Backend transport configuration.
    ///
    /// The embedder handle is attached by the caller; it depends on runtime
    /// provider resolution, not on static settings.
    pub fn backend_config(&self, embedder: Option<Arc<dyn EmbeddingProvider>>) -> VectorBackendConfig {
        VectorBackendConfig {
            host_url: self.host_url.clone(),
            plugin_url: self.plugin_url.clone(),
            embedding_source: Some(self.source.clone()),
            embedding_model: self.model_for(&self.source),
            qdrant: QdrantSettings {
                url: self.qdrant_url.clone(),
                host: self.qdrant_host.clone(),
                port: self.qdrant_port,
                api_key: self.qdrant_api_key.clone(),
                use_cloud: self.qdrant_use_cloud,
                multitenancy: self.qdrant_multitenancy,
            },
            milvus: MilvusSettings {
                address: self.milvus_address.clone(),
                host: self.milvus_host.clone(),
                port: self.milvus_port,
                username: self.milvus_username.clone(),
                password: self.milvus_password.clone(),
                token: self.milvus_token.clone(),
                dimensions: self.milvus_dimensions,
            },
            embedder,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Chunker configuration
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            strategy: self.chunking_strategy,
            batch_size: self.batch_size,
            chunk_size: self.chunk_size,
            deduplication_depth: self.deduplication_depth,
            min_chat_length: self.min_chat_length,
        }
    }

    /// Keyword extractor for the configured level and custom stop-words.
    ///
    /// `expand` resolves host macros (e.g. `{{char}}`) inside the custom
    /// stop-word string before it is parsed.
    pub fn keyword_extractor<F: Fn(&str) -> String>(
        &self,
        expand: F,
    ) -> vecthare_application::keywords::KeywordExtractor {
        vecthare_application::keywords::KeywordExtractor::new(self.keyword_extraction_level)
            .with_custom_stop_words(&self.custom_stopwords, expand)
    }

    /// Retrieval settings for the query orchestrator
    pub fn retrieval_settings(&self, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Result<RetrievalSettings> {
        Ok(RetrievalSettings {
            backend: self.backend_kind()?,
            backend_config: self.backend_config(embedder),
            embedding: self.embedding_config(),
            query_messages: self.query,
            top_k: self.top_k,
            insert_count: self.insert,
            protect: self.protect,
            score_threshold: self.score_threshold,
            hybrid: HybridSettings {
                enabled: self.hybrid_search_enabled,
                fusion_method: self.hybrid_fusion_method,
                vector_weight: self.hybrid_vector_weight,
                text_weight: self.hybrid_text_weight,
                rrf_k: self.hybrid_rrf_k,
                native_prefer: self.hybrid_native_prefer,
            },
            keyword: KeywordSettings {
                scoring_method: self.keyword_scoring_method,
                bm25_k1: self.bm25_k1,
                bm25_b: self.bm25_b,
                extraction_level: self.keyword_extraction_level,
            },
            decay: self.temporal_decay.clone(),
            world_info: WorldInfoSettings {
                enabled: self.enabled_world_info,
                threshold: self.world_info_threshold,
                top_k: self.world_info_top_k,
                query_depth: self.world_info_query_depth,
            },
            rag_context: self.rag_context.clone(),
            rag_xml_tag: self.rag_xml_tag.clone(),
            position: self.position,
            depth: self.depth,
            request_timeout: Duration::from_secs(30),
        })
    }

    /// Sync configuration for the sync controller
    pub fn sync_config(&self, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Result<SyncConfig> {
        Ok(SyncConfig {
            backend: self.backend_kind()?,
            backend_config: self.backend_config(embedder),
            embedding: self.embedding_config(),
            rate_limit_calls: self.rate_limit_calls,
            rate_limit_interval: Duration::from_secs(self.rate_limit_interval.max(1)),
            debounce: Duration::from_millis(300),
        })
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.backend_kind()?;
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(Error::config(format!(
                "score_threshold must be in [0, 1], got {}",
                self.score_threshold
            )));
        }
        if self.hybrid_vector_weight < 0.0 || self.hybrid_text_weight < 0.0 {
            return Err(Error::config("hybrid weights must be non-negative"));
        }
        if self.bm25_k1 <= 0.0 || !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(Error::config(format!(
                "bm25 parameters out of range: k1={}, b={}",
                self.bm25_k1, self.bm25_b
            )));
        }
        if self.temporal_decay.enabled {
            self.temporal_decay.validate()?;
        }
        if self.top_k == 0 {
            return Err(Error::config("top_k must be positive"));
        }
        Ok(())
    }
}
