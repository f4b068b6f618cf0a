//! Embedding Provider Registry
//!
//! Auto-registration system for embedding providers. Providers register
//! themselves with `#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]` and
//! are discovered here by source name.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vecthare_domain::ports::EmbeddingProvider;

/// Google transport discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoogleApi {
    /// AI Studio / MakerSuite key-based API
    MakerSuite,
    /// Vertex AI service-account API
    VertexAi,
}

/// Cohere embedding input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohereInputType {
    /// Embedding a retrieval query
    SearchQuery,
    /// Embedding a stored document
    SearchDocument,
}

impl CohereInputType {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchQuery => "search_query",
            Self::SearchDocument => "search_document",
        }
    }
}

/// Recognized transport options for embedding calls.
///
/// Providers use what they need and ignore the rest.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTransport {
    /// Provider API base URL (ollama, llamacpp, vllm, koboldcpp, bananabread,
    /// or an OpenAI-compatible override)
    pub api_url: Option<String>,
    /// Bearer credential for authenticated providers
    pub api_key: Option<String>,
    /// Extras server URL
    pub extras_url: Option<String>,
    /// Extras server key
    pub extras_key: Option<String>,
    /// Keep the ollama model loaded between calls
    pub keep: bool,
    /// Which Google API the `google` source targets
    pub google_api: Option<GoogleApi>,
    /// Vertex AI auth mode (`full` service account or `express` key)
    pub vertexai_auth_mode: Option<String>,
    /// Vertex AI region
    pub vertexai_region: Option<String>,
    /// Vertex AI express-mode project ID
    pub vertexai_express_project_id: Option<String>,
    /// Cohere input type
    pub input_type: Option<CohereInputType>,
}

/// Configuration for embedding provider creation
#[derive(Debug, Clone, Default)]
pub struct EmbeddingProviderConfig {
    /// Source name (e.g. "openai", "ollama", "transformers")
    pub source: String,
    /// Model for the source; providers fall back to their default
    pub model: Option<String>,
    /// Transport options
    pub transport: EmbeddingTransport,
}

impl EmbeddingProviderConfig {
    /// Create a new config for the given source
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the API URL
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.transport.api_url = Some(url.into());
        self
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.transport.api_key = Some(key.into());
        self
    }
}

/// Registry entry for embedding providers
pub struct EmbeddingProviderEntry {
    /// Unique source name
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Factory function to create provider instance
    pub factory:
        fn(&EmbeddingProviderConfig) -> std::result::Result<Arc<dyn EmbeddingProvider>, String>,
}

/// Distributed slice collecting provider entries at link time
#[linkme::distributed_slice]
pub static EMBEDDING_PROVIDERS: [EmbeddingProviderEntry] = [..];

/// Resolve an embedding provider by source name.
///
/// # Returns
/// * `Ok(provider)` - created instance
/// * `Err(message)` - unknown source or factory failure
pub fn resolve_embedding_provider(
    config: &EmbeddingProviderConfig,
) -> std::result::Result<Arc<dyn EmbeddingProvider>, String> {
    let source = config.source.to_ascii_lowercase();

    for entry in EMBEDDING_PROVIDERS {
        if entry.name == source {
            return (entry.factory)(config);
        }
    }

    let available: Vec<&str> = EMBEDDING_PROVIDERS.iter().map(|e| e.name).collect();
    Err(format!(
        "Unknown embedding source '{}'. Available sources: {:?}",
        config.source, available
    ))
}

/// List all registered embedding providers as (name, description) pairs
pub fn list_embedding_providers() -> Vec<(&'static str, &'static str)> {
    EMBEDDING_PROVIDERS
        .iter()
        .map(|e| (e.name, e.description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EmbeddingProviderConfig::new("openai")
            .with_model("text-embedding-3-small")
            .with_api_url("https://api.openai.com/v1")
            .with_api_key("sk-test");

        assert_eq!(config.source, "openai");
        assert_eq!(config.model.as_deref(), Some("text-embedding-3-small"));
        assert_eq!(
            config.transport.api_url.as_deref(),
            Some("https://api.openai.com/v1")
        );
        assert_eq!(config.transport.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn unknown_source_lists_alternatives() {
        let err = match resolve_embedding_provider(&EmbeddingProviderConfig::new("no-such-source"))
        {
            Err(e) => e,
            Ok(_) => panic!("expected an error for an unknown source"),
        };
        assert!(err.contains("no-such-source"));
    }
}
