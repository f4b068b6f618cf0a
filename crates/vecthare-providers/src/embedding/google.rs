//! Google Embedding Provider
//!
//! One implementation behind two Google transports, selected by the
//! configured API discriminator: AI Studio (MakerSuite) key auth with
//! batched `batchEmbedContents`, and Vertex AI express-mode key auth
//! against the publisher model `:predict` endpoint.
//!
//! Vertex full service-account auth is handled by the host process (it
//! owns the credential file); configuring it here is rejected up front.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use vecthare_application::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry, GoogleApi,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{BatchLimit, EmbeddingProvider};
use vecthare_domain::value_objects::Embedding;

use crate::constants::{CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT, MAKERSUITE_DEFAULT_BASE_URL};
use crate::embedding::helpers::{check_count, constructor, parse_vector};
use crate::utils::HttpResponseUtils;

/// Vertex AI express-mode settings
#[derive(Debug, Clone)]
pub struct VertexExpress {
    /// Deployment region (e.g. "us-central1")
    pub region: String,
    /// Express-mode project ID
    pub project_id: String,
}

/// Google embedding provider (MakerSuite or Vertex AI express)
pub struct GoogleEmbeddingProvider {
    api: GoogleApi,
    api_key: String,
    base_url: String,
    model: String,
    vertex: Option<VertexExpress>,
    timeout: Duration,
    http_client: Client,
}

impl GoogleEmbeddingProvider {
    /// Create a provider for the given Google API
    pub fn new(
        api: GoogleApi,
        api_key: String,
        base_url: String,
        model: String,
        vertex: Option<VertexExpress>,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        Self {
            api,
            api_key,
            base_url,
            model,
            vertex,
            timeout,
            http_client,
        }
    }

    /// Model name without the `models/` prefix
    fn api_model_name(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }

    async fn fetch_makersuite(&self, texts: &[String]) -> Result<serde_json::Value> {
        let model = self.api_model_name();
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                serde_json::json!({
                    "model": format!("models/{model}"),
                    "content": { "parts": [{ "text": text }] }
                })
            })
            .collect();
        let payload = serde_json::json!({ "requests": requests });

        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents?key={}",
            self.base_url, model, self.api_key
        );

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("Google", e))?;

        HttpResponseUtils::check_and_parse(response, "Google").await
    }

    async fn fetch_vertex(&self, texts: &[String]) -> Result<serde_json::Value> {
        let vertex = self
            .vertex
            .as_ref()
            .ok_or_else(|| Error::config("Vertex AI requires region and project ID"))?;

        let instances: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| serde_json::json!({ "content": text }))
            .collect();
        let payload = serde_json::json!({ "instances": instances });

        let url = format!(
            "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/google/models/{model}:predict?key={key}",
            region = vertex.region,
            project = vertex.project_id,
            model = self.api_model_name(),
            key = self.api_key,
        );

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("Vertex AI", e))?;

        HttpResponseUtils::check_and_parse(response, "Vertex AI").await
    }
}

#[async_trait]
impl EmbeddingProvider for GoogleEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match self.api {
            GoogleApi::MakerSuite => {
                let response = self.fetch_makersuite(texts).await?;
                let embeddings = response["embeddings"]
                    .as_array()
                    .ok_or_else(|| Error::protocol("Google response missing embeddings array"))?;
                check_count("Google", texts.len(), embeddings.len())?;
                embeddings
                    .iter()
                    .map(|item| {
                        Ok(Embedding::new(parse_vector(&item["values"], "Google")?, &self.model))
                    })
                    .collect()
            }
            GoogleApi::VertexAi => {
                let response = self.fetch_vertex(texts).await?;
                let predictions = response["predictions"]
                    .as_array()
                    .ok_or_else(|| Error::protocol("Vertex AI response missing predictions"))?;
                check_count("Vertex AI", texts.len(), predictions.len())?;
                predictions
                    .iter()
                    .map(|item| {
                        Ok(Embedding::new(
                            parse_vector(&item["embeddings"]["values"], "Vertex AI")?,
                            &self.model,
                        ))
                    })
                    .collect()
            }
        }
    }

    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Limited(100)
    }

    fn provider_name(&self) -> &str {
        match self.api {
            GoogleApi::MakerSuite => "makersuite",
            GoogleApi::VertexAi => "vertexai",
        }
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

fn google_factory(
    api: GoogleApi,
    config: &EmbeddingProviderConfig,
) -> std::result::Result<Arc<dyn EmbeddingProvider>, String> {
    let api_key = constructor::require_api_key(config.transport.api_key.as_deref(), "Google")
        .map_err(|e| e.to_string())?;
    let base_url = constructor::effective_url(
        config.transport.api_url.as_deref(),
        MAKERSUITE_DEFAULT_BASE_URL,
    );
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| "text-embedding-004".to_string());

    let vertex = if api == GoogleApi::VertexAi {
        let auth_mode = config
            .transport
            .vertexai_auth_mode
            .as_deref()
            .unwrap_or("express");
        if auth_mode != "express" {
            return Err(format!(
                "Vertex AI auth mode '{auth_mode}' is handled by the host; only 'express' is supported here"
            ));
        }
        Some(VertexExpress {
            region: config
                .transport
                .vertexai_region
                .clone()
                .unwrap_or_else(|| "us-central1".to_string()),
            project_id: config
                .transport
                .vertexai_express_project_id
                .clone()
                .ok_or_else(|| "Vertex AI express mode requires a project ID".to_string())?,
        })
    } else {
        None
    };

    let http_client = Client::builder()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    Ok(Arc::new(GoogleEmbeddingProvider::new(
        api,
        api_key,
        base_url,
        model,
        vertex,
        DEFAULT_REQUEST_TIMEOUT,
        http_client,
    )))
}

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static MAKERSUITE_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "makersuite",
    description: "Google AI Studio embedding provider (text-embedding-004)",
    factory: |config| google_factory(GoogleApi::MakerSuite, config),
};

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static VERTEXAI_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "vertexai",
    description: "Google Vertex AI embedding provider (express key mode)",
    factory: |config| google_factory(GoogleApi::VertexAi, config),
};
