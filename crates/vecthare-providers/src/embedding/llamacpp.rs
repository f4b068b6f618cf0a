//! llama.cpp Embedding Provider
//!
//! Talks to a llama.cpp server's `/embedding` endpoint, one text per
//! request. The server must be started with embedding support enabled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use vecthare_application::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{BatchLimit, EmbeddingProvider};
use vecthare_domain::value_objects::Embedding;

use crate::constants::{CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT};
use crate::embedding::helpers::{constructor, parse_vector};
use crate::utils::HttpResponseUtils;

/// llama.cpp embedding provider
pub struct LlamaCppEmbeddingProvider {
    base_url: String,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl LlamaCppEmbeddingProvider {
    /// Create a new llama.cpp embedding provider
    pub fn new(base_url: String, model: String, timeout: Duration, http_client: Client) -> Self {
        Self {
            base_url,
            model,
            timeout,
            http_client,
        }
    }

    async fn fetch_single_embedding(&self, text: &str) -> Result<serde_json::Value> {
        let payload = serde_json::json!({ "content": text });

        let response = self
            .http_client
            .post(format!("{}/embedding", self.base_url))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("llama.cpp", e))?;

        HttpResponseUtils::check_and_parse(response, "llama.cpp").await
    }
}

#[async_trait]
impl EmbeddingProvider for LlamaCppEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let response = self.fetch_single_embedding(text).await?;
            // Newer servers nest the vector one level deeper
            let value = if response["embedding"].is_array() {
                response["embedding"].clone()
            } else {
                response[0]["embedding"].clone()
            };
            let vector = parse_vector(&value, "llama.cpp")
                .map_err(|_| Error::protocol("llama.cpp response missing embedding array"))?;
            results.push(Embedding::new(vector, &self.model));
        }

        Ok(results)
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Single
    }

    fn provider_name(&self) -> &str {
        "llamacpp"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static LLAMACPP_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "llamacpp",
    description: "llama.cpp server embedding provider",
    factory: |config: &EmbeddingProviderConfig| {
        let base_url = constructor::require_url(config.transport.api_url.as_deref(), "llama.cpp")
            .map_err(|e| e.to_string())?;
        let model = config.model.clone().unwrap_or_default();
        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Arc::new(LlamaCppEmbeddingProvider::new(
            base_url,
            model,
            DEFAULT_REQUEST_TIMEOUT,
            http_client,
        )))
    },
};
