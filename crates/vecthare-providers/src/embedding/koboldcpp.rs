//! KoboldCpp Embedding Provider
//!
//! KoboldCpp exposes an OpenAI-flavoured `/v1/embeddings` endpoint but only
//! embeds one text per request.

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

/// KoboldCpp embedding provider
pub struct KoboldCppEmbeddingProvider {
    base_url: String,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl KoboldCppEmbeddingProvider {
    /// Create a new KoboldCpp embedding provider
    pub fn new(base_url: String, model: String, timeout: Duration, http_client: Client) -> Self {
        Self {
            base_url,
            model,
            timeout,
            http_client,
        }
    }

    async fn fetch_single_embedding(&self, text: &str) -> Result<serde_json::Value> {
        let payload = serde_json::json!({
            "input": text,
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
            .map_err(|e| HttpResponseUtils::transport_error("KoboldCpp", e))?;

        HttpResponseUtils::check_and_parse(response, "KoboldCpp").await
    }
}

#[async_trait]
impl EmbeddingProvider for KoboldCppEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let response = self.fetch_single_embedding(text).await?;
            let vector = parse_vector(&response["data"][0]["embedding"], "KoboldCpp")
                .map_err(|_| Error::protocol("KoboldCpp response missing embedding array"))?;
            results.push(Embedding::new(vector, &self.model));
        }

        Ok(results)
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Single
    }

    fn provider_name(&self) -> &str {
        "koboldcpp"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static KOBOLDCPP_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "koboldcpp",
    description: "KoboldCpp embedding provider (single-text /v1/embeddings)",
    factory: |config: &EmbeddingProviderConfig| {
        let base_url = constructor::require_url(config.transport.api_url.as_deref(), "KoboldCpp")
            .map_err(|e| e.to_string())?;
        let model = config.model.clone().unwrap_or_default();
        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Arc::new(KoboldCppEmbeddingProvider::new(
            base_url,
            model,
            DEFAULT_REQUEST_TIMEOUT,
            http_client,
        )))
    },
};
