//! OpenAI-compatible Embedding Providers
//!
//! One implementation covering every OpenAI-shaped embedding API: OpenAI
//! itself plus TogetherAI, Mistral, ElectronHub, and OpenRouter. They share
//! the `POST /embeddings` wire shape and differ only in base URL, default
//! model, and credential.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use vecthare_application::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{BatchLimit, EmbeddingProvider};
use vecthare_domain::value_objects::Embedding;

use crate::constants::{
    CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT, ELECTRONHUB_DEFAULT_BASE_URL,
    MISTRAL_DEFAULT_BASE_URL, OPENAI_DEFAULT_BASE_URL, OPENROUTER_DEFAULT_BASE_URL,
    TOGETHERAI_DEFAULT_BASE_URL,
};
use crate::embedding::helpers::{check_count, constructor, parse_vector};
use crate::utils::HttpResponseUtils;

/// OpenAI-compatible embedding provider
///
/// Handles any endpoint speaking the OpenAI `/embeddings` shape. Arrays of
/// texts pass through whole; the response preserves input order via the
/// per-item `index` field.
pub struct OpenAiCompatibleProvider {
    source: &'static str,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl OpenAiCompatibleProvider {
    /// Create a provider for one of the OpenAI-shaped sources
    pub fn new(
        source: &'static str,
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        Self {
            source,
            api_key,
            base_url,
            model,
            timeout,
            http_client,
        }
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL for this provider
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_embeddings(&self, texts: &[String]) -> Result<serde_json::Value> {
        let payload = serde_json::json!({
            "input": texts,
            "model": self.model,
            "encoding_format": "float"
        });

        let response = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error(self.source, e))?;

        HttpResponseUtils::check_and_parse(response, self.source).await
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.fetch_embeddings(texts).await?;
        let data = response["data"].as_array().ok_or_else(|| {
            Error::protocol(format!("{} response missing data array", self.source))
        })?;
        check_count(self.source, texts.len(), data.len())?;

        // Items may arrive out of order; the index field is authoritative
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in data {
            let index = item["index"].as_u64().unwrap_or(0) as usize;
            if index >= vectors.len() {
                return Err(Error::protocol(format!(
                    "{} returned out-of-range index {index}",
                    self.source
                )));
            }
            vectors[index] = Some(parse_vector(&item["embedding"], self.source)?);
        }

        vectors
            .into_iter()
            .map(|v| {
                v.map(|vector| Embedding::new(vector, &self.model)).ok_or_else(|| {
                    Error::protocol(format!("{} response skipped an index", self.source))
                })
            })
            .collect()
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Unlimited
    }

    fn provider_name(&self) -> &str {
        self.source
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

macro_rules! openai_shaped_entry {
    ($static_name:ident, $source:literal, $default_url:expr, $default_model:literal, $description:literal) => {
        #[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
        static $static_name: EmbeddingProviderEntry = EmbeddingProviderEntry {
            name: $source,
            description: $description,
            factory: |config: &EmbeddingProviderConfig| {
                let api_key =
                    constructor::require_api_key(config.transport.api_key.as_deref(), $source)
                        .map_err(|e| e.to_string())?;
                let base_url =
                    constructor::effective_url(config.transport.api_url.as_deref(), $default_url);
                let model = config
                    .model
                    .clone()
                    .unwrap_or_else(|| $default_model.to_string());
                let http_client = Client::builder()
                    .timeout(DEFAULT_REQUEST_TIMEOUT)
                    .build()
                    .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

                Ok(Arc::new(OpenAiCompatibleProvider::new(
                    $source,
                    api_key,
                    base_url,
                    model,
                    DEFAULT_REQUEST_TIMEOUT,
                    http_client,
                )))
            },
        };
    };
}

openai_shaped_entry!(
    OPENAI_PROVIDER,
    "openai",
    OPENAI_DEFAULT_BASE_URL,
    "text-embedding-3-small",
    "OpenAI embedding provider (text-embedding-3-small/large, ada-002)"
);
openai_shaped_entry!(
    TOGETHERAI_PROVIDER,
    "togetherai",
    TOGETHERAI_DEFAULT_BASE_URL,
    "togethercomputer/m2-bert-80M-32k-retrieval",
    "TogetherAI embedding provider (OpenAI-compatible)"
);
openai_shaped_entry!(
    MISTRAL_PROVIDER,
    "mistral",
    MISTRAL_DEFAULT_BASE_URL,
    "mistral-embed",
    "Mistral embedding provider (OpenAI-compatible)"
);
openai_shaped_entry!(
    ELECTRONHUB_PROVIDER,
    "electronhub",
    ELECTRONHUB_DEFAULT_BASE_URL,
    "text-embedding-3-small",
    "ElectronHub embedding provider (OpenAI-compatible)"
);
openai_shaped_entry!(
    OPENROUTER_PROVIDER,
    "openrouter",
    OPENROUTER_DEFAULT_BASE_URL,
    "openai/text-embedding-3-small",
    "OpenRouter embedding provider (OpenAI-compatible)"
);
