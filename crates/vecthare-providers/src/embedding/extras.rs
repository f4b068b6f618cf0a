//! Extras Embedding Provider
//!
//! The host's extras server exposes a single-text embedding endpoint at a
//! user-configured URL, optionally guarded by a key.

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

/// Extras server embedding provider
pub struct ExtrasEmbeddingProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl ExtrasEmbeddingProvider {
    /// Create a new extras embedding provider
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        Self {
            base_url,
            api_key,
            model,
            timeout,
            http_client,
        }
    }

    async fn fetch_single_embedding(&self, text: &str) -> Result<serde_json::Value> {
        let payload = serde_json::json!({ "text": text });

        let mut request = self
            .http_client
            .post(format!("{}/api/embeddings/compute", self.base_url))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("Extras", e))?;

        HttpResponseUtils::check_and_parse(response, "Extras").await
    }
}

#[async_trait]
impl EmbeddingProvider for ExtrasEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let response = self.fetch_single_embedding(text).await?;
            let vector = parse_vector(&response["embedding"], "Extras")
                .map_err(|_| Error::protocol("Extras response missing embedding array"))?;
            results.push(Embedding::new(vector, &self.model));
        }

        Ok(results)
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Single
    }

    fn provider_name(&self) -> &str {
        "extras"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static EXTRAS_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "extras",
    description: "Extras server embedding provider",
    factory: |config: &EmbeddingProviderConfig| {
        let base_url = constructor::require_url(config.transport.extras_url.as_deref(), "Extras")
            .map_err(|e| e.to_string())?;
        let api_key = config
            .transport
            .extras_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        let model = config.model.clone().unwrap_or_default();
        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Arc::new(ExtrasEmbeddingProvider::new(
            base_url,
            api_key,
            model,
            DEFAULT_REQUEST_TIMEOUT,
            http_client,
        )))
    },
};
