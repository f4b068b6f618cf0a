//! BananaBread Embedding Provider
//!
//! A named local embedding server speaking `POST /embedding` with a
//! `{content: [...]}` body. Accepts up to 20 texts per request; a one-item
//! batch may come back as a flat vector instead of a list of vectors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use vecthare_application::embedding::normalize_single_flattened;
use vecthare_application::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{BatchLimit, EmbeddingProvider};
use vecthare_domain::value_objects::Embedding;

use crate::constants::{BANANABREAD_MAX_BATCH, CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT};
use crate::embedding::helpers::{check_count, constructor};
use crate::utils::HttpResponseUtils;

/// BananaBread embedding provider
pub struct BananaBreadEmbeddingProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl BananaBreadEmbeddingProvider {
    /// Create a new BananaBread embedding provider
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

    async fn fetch_embeddings(&self, texts: &[String]) -> Result<serde_json::Value> {
        let payload = serde_json::json!({ "content": texts });

        let mut request = self
            .http_client
            .post(format!("{}/embedding", self.base_url))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("BananaBread", e))?;

        HttpResponseUtils::check_and_parse(response, "BananaBread").await
    }
}

#[async_trait]
impl EmbeddingProvider for BananaBreadEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for window in texts.chunks(BANANABREAD_MAX_BATCH) {
            let response = self.fetch_embeddings(window).await?;
            let vectors = normalize_single_flattened(&response["embedding"]).ok_or_else(|| {
                Error::protocol("BananaBread response missing embedding array")
            })?;
            check_count("BananaBread", window.len(), vectors.len())?;
            results.extend(
                vectors
                    .into_iter()
                    .map(|vector| Embedding::new(vector, &self.model)),
            );
        }

        Ok(results)
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Limited(BANANABREAD_MAX_BATCH)
    }

    fn provider_name(&self) -> &str {
        "bananabread"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static BANANABREAD_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "bananabread",
    description: "BananaBread local embedding server (batches of 20)",
    factory: |config: &EmbeddingProviderConfig| {
        let base_url = constructor::require_url(config.transport.api_url.as_deref(), "BananaBread")
            .map_err(|e| e.to_string())?;
        let api_key = config
            .transport
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        let model = config.model.clone().unwrap_or_default();
        let http_client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Arc::new(BananaBreadEmbeddingProvider::new(
            base_url,
            api_key,
            model,
            DEFAULT_REQUEST_TIMEOUT,
            http_client,
        )))
    },
};
