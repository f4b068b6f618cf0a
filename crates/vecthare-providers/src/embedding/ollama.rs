//! Ollama Embedding Provider
//!
//! Local embedding through an Ollama server. The API takes one prompt per
//! request, so batches are processed sequentially; `keep` pins the model in
//! memory between calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use vecthare_application::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{BatchLimit, EmbeddingProvider};
use vecthare_domain::value_objects::Embedding;

use crate::constants::{CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT, OLLAMA_DEFAULT_URL};
use crate::embedding::helpers::{constructor, parse_vector};
use crate::utils::HttpResponseUtils;

/// Ollama embedding provider
pub struct OllamaEmbeddingProvider {
    base_url: String,
    model: String,
    keep_alive: bool,
    timeout: Duration,
    http_client: Client,
}

impl OllamaEmbeddingProvider {
    /// Create a new Ollama embedding provider
    pub fn new(
        base_url: String,
        model: String,
        keep_alive: bool,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        Self {
            base_url,
            model,
            keep_alive,
            timeout,
            http_client,
        }
    }

    /// Get the model name for this provider
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn fetch_single_embedding(&self, text: &str) -> Result<serde_json::Value> {
        let mut payload = serde_json::json!({
            "model": self.model,
            "prompt": text,
            "stream": false
        });
        if self.keep_alive {
            // -1 keeps the model resident until Ollama shuts down
            payload["keep_alive"] = serde_json::json!(-1);
        }

        let response = self
            .http_client
            .post(format!("{}/api/embeddings", self.base_url))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("Ollama", e))?;

        HttpResponseUtils::check_and_parse(response, "Ollama").await
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // The Ollama API embeds one prompt per request
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let response = self.fetch_single_embedding(text).await?;
            let vector = parse_vector(&response["embedding"], "Ollama")
                .map_err(|_| Error::protocol("Ollama response missing embedding array"))?;
            results.push(Embedding::new(vector, &self.model));
        }

        Ok(results)
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Single
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static OLLAMA_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "ollama",
    description: "Ollama local embedding provider (nomic-embed-text, all-minilm, etc.)",
    factory: |config: &EmbeddingProviderConfig| {
        let base_url =
            constructor::effective_url(config.transport.api_url.as_deref(), OLLAMA_DEFAULT_URL);
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "nomic-embed-text".to_string());
        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Arc::new(OllamaEmbeddingProvider::new(
            base_url,
            model,
            config.transport.keep,
            DEFAULT_REQUEST_TIMEOUT,
            http_client,
        )))
    },
};
