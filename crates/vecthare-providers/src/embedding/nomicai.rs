//! NomicAI Embedding Provider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use vecthare_application::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{BatchLimit, EmbeddingProvider};
use vecthare_domain::value_objects::Embedding;

use crate::constants::{CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT, NOMICAI_DEFAULT_BASE_URL};
use crate::embedding::helpers::{check_count, constructor, parse_vector};
use crate::utils::HttpResponseUtils;

/// NomicAI embedding provider
pub struct NomicAiEmbeddingProvider {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl NomicAiEmbeddingProvider {
    /// Create a new NomicAI embedding provider
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        Self {
            api_key,
            base_url,
            model,
            timeout,
            http_client,
        }
    }

    async fn fetch_embeddings(&self, texts: &[String]) -> Result<serde_json::Value> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let response = self
            .http_client
            .post(format!("{}/embedding/text", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("NomicAI", e))?;

        HttpResponseUtils::check_and_parse(response, "NomicAI").await
    }
}

#[async_trait]
impl EmbeddingProvider for NomicAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.fetch_embeddings(texts).await?;
        let embeddings = response["embeddings"]
            .as_array()
            .ok_or_else(|| Error::protocol("NomicAI response missing embeddings array"))?;
        check_count("NomicAI", texts.len(), embeddings.len())?;

        embeddings
            .iter()
            .map(|item| Ok(Embedding::new(parse_vector(item, "NomicAI")?, &self.model)))
            .collect()
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Unlimited
    }

    fn provider_name(&self) -> &str {
        "nomicai"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static NOMICAI_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "nomicai",
    description: "NomicAI Atlas embedding provider (nomic-embed-text-v1.5)",
    factory: |config: &EmbeddingProviderConfig| {
        let api_key = constructor::require_api_key(config.transport.api_key.as_deref(), "NomicAI")
            .map_err(|e| e.to_string())?;
        let base_url = constructor::effective_url(
            config.transport.api_url.as_deref(),
            NOMICAI_DEFAULT_BASE_URL,
        );
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "nomic-embed-text-v1.5".to_string());
        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Arc::new(NomicAiEmbeddingProvider::new(
            api_key,
            base_url,
            model,
            DEFAULT_REQUEST_TIMEOUT,
            http_client,
        )))
    },
};
