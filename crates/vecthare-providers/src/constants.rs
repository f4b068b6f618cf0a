//! Provider constants

use std::time::Duration;

/// Content type for JSON API requests
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Default timeout for provider API requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// === Embedding defaults ===

/// Default OpenAI API base URL
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default TogetherAI API base URL
pub const TOGETHERAI_DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";

/// Default Mistral API base URL
pub const MISTRAL_DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Default ElectronHub API base URL
pub const ELECTRONHUB_DEFAULT_BASE_URL: &str = "https://api.electronhub.ai/v1";

/// Default OpenRouter API base URL
pub const OPENROUTER_DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default Cohere API base URL
pub const COHERE_DEFAULT_BASE_URL: &str = "https://api.cohere.ai/v1";

/// Default NomicAI API base URL
pub const NOMICAI_DEFAULT_BASE_URL: &str = "https://api-atlas.nomic.ai/v1";

/// Default Google AI Studio base URL
pub const MAKERSUITE_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default Ollama server URL
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Maximum texts per bananabread request
pub const BANANABREAD_MAX_BATCH: usize = 20;

// === Vector store limits ===

/// Hash listing cap shared by all backends
pub const LIST_LIMIT: usize = 10_000;

/// Qdrant insert batch cap, keeps requests under the 32 MB payload limit
pub const QDRANT_INSERT_BATCH: usize = 100;

/// Default Qdrant port
pub const QDRANT_DEFAULT_PORT: u16 = 6333;

/// Default Milvus address
pub const MILVUS_DEFAULT_ADDRESS: &str = "http://localhost:19530";

/// Probe string used for dimension discovery
pub const DIMENSION_PROBE_TEXT: &str = "dimension probe";

/// Host native vector API path prefix
pub const HOST_VECTOR_API_PATH: &str = "/api/vector";

/// Host plugin API path prefix
pub const HOST_PLUGIN_API_PATH: &str = "/api/plugins/vecthare";
