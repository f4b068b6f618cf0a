//! Cohere Embedding Provider
//!
//! Cohere distinguishes query from document embeddings through an
//! `input_type` field; retrieval quality depends on callers setting it
//! correctly for each side of the search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use vecthare_application::registry::{
    CohereInputType, EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{BatchLimit, EmbeddingProvider};
use vecthare_domain::value_objects::Embedding;

use crate::constants::{COHERE_DEFAULT_BASE_URL, CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT};
use crate::embedding::helpers::{check_count, constructor, parse_vector};
use crate::utils::HttpResponseUtils;

/// Cohere embedding provider
pub struct CohereEmbeddingProvider {
    api_key: String,
    base_url: String,
    model: String,
    input_type: CohereInputType,
    timeout: Duration,
    http_client: Client,
}

impl CohereEmbeddingProvider {
    /// Create a new Cohere embedding provider
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        input_type: CohereInputType,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        Self {
            api_key,
            base_url,
            model,
            input_type,
            timeout,
            http_client,
        }
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn fetch_embeddings(&self, texts: &[String]) -> Result<serde_json::Value> {
        let payload = serde_json::json!({
            "texts": texts,
            "model": self.model,
            "input_type": self.input_type.as_str(),
        });

        let response = self
            .http_client
            .post(format!("{}/embed", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("Cohere", e))?;

        HttpResponseUtils::check_and_parse(response, "Cohere").await
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.fetch_embeddings(texts).await?;
        let embeddings = response["embeddings"]
            .as_array()
            .ok_or_else(|| Error::protocol("Cohere response missing embeddings array"))?;
        check_count("Cohere", texts.len(), embeddings.len())?;

        embeddings
            .iter()
            .map(|item| Ok(Embedding::new(parse_vector(item, "Cohere")?, &self.model)))
            .collect()
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Unlimited
    }

    fn provider_name(&self) -> &str {
        "cohere"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static COHERE_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "cohere",
    description: "Cohere embedding provider (embed-english-v3.0, input-type aware)",
    factory: |config: &EmbeddingProviderConfig| {
        let api_key = constructor::require_api_key(config.transport.api_key.as_deref(), "Cohere")
            .map_err(|e| e.to_string())?;
        let base_url =
            constructor::effective_url(config.transport.api_url.as_deref(), COHERE_DEFAULT_BASE_URL);
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "embed-english-v3.0".to_string());
        let input_type = config
            .transport
            .input_type
            .unwrap_or(CohereInputType::SearchDocument);
        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Arc::new(CohereEmbeddingProvider::new(
            api_key,
            base_url,
            model,
            input_type,
            DEFAULT_REQUEST_TIMEOUT,
            http_client,
        )))
    },
};
