//! vLLM Embedding Provider
//!
//! vLLM serves the OpenAI `/embeddings` shape on a user-configured URL,
//! without authentication.

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
use crate::embedding::helpers::{check_count, constructor, parse_vector};
use crate::utils::HttpResponseUtils;

/// vLLM embedding provider
pub struct VllmEmbeddingProvider {
    base_url: String,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl VllmEmbeddingProvider {
    /// Create a new vLLM embedding provider
    pub fn new(base_url: String, model: String, timeout: Duration, http_client: Client) -> Self {
        Self {
            base_url,
            model,
            timeout,
            http_client,
        }
    }

    async fn fetch_embeddings(&self, texts: &[String]) -> Result<serde_json::Value> {
        let payload = serde_json::json!({
            "input": texts,
            "model": self.model,
        });

        let response = self
            .http_client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("vLLM", e))?;

        HttpResponseUtils::check_and_parse(response, "vLLM").await
    }
}

#[async_trait]
impl EmbeddingProvider for VllmEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.fetch_embeddings(texts).await?;
        let data = response["data"]
            .as_array()
            .ok_or_else(|| Error::protocol("vLLM response missing data array"))?;
        check_count("vLLM", texts.len(), data.len())?;

        data.iter()
            .map(|item| Ok(Embedding::new(parse_vector(&item["embedding"], "vLLM")?, &self.model)))
            .collect()
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Unlimited
    }

    fn provider_name(&self) -> &str {
        "vllm"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static VLLM_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "vllm",
    description: "vLLM embedding provider (OpenAI-compatible, no auth)",
    factory: |config: &EmbeddingProviderConfig| {
        let base_url = constructor::require_url(config.transport.api_url.as_deref(), "vLLM")
            .map_err(|e| e.to_string())?;
        let model = config.model.clone().unwrap_or_default();
        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Arc::new(VllmEmbeddingProvider::new(
            base_url,
            model,
            DEFAULT_REQUEST_TIMEOUT,
            http_client,
        )))
    },
};
