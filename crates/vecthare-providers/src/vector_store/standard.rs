//! Standard (host-native) vector backend
//!
//! Uses the host application's built-in vector API as primary transport.
//! An extended plugin API is probed at initialization and used for
//! metadata-bearing operations when available; without it the adapter
//! falls back to the native API, where keywords ride inside the searchable
//! text as a `[KEYWORDS: ...]` suffix.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use vecthare_application::registry::{
    VECTOR_BACKENDS, VectorBackendConfig, VectorBackendEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::VectorBackend;
use vecthare_domain::value_objects::{
    BackendKind, Chunk, ChunkMetadata, CollectionId, CollectionQueryResult, QueryRequest,
    RetrievedChunk,
};

use crate::constants::{
    CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT, HOST_PLUGIN_API_PATH, HOST_VECTOR_API_PATH,
    LIST_LIMIT,
};
use crate::utils::{HttpResponseUtils, JsonExt};

use super::parse_dimension_error;

/// Host-native vector backend with optional plugin extension
pub struct StandardBackend {
    host_url: String,
    plugin_url: String,
    source: String,
    model: String,
    http_client: Client,
    plugin_available: OnceCell<bool>,
}

impl StandardBackend {
    /// Create a new standard backend
    pub fn new(
        host_url: String,
        plugin_url: Option<String>,
        source: String,
        model: String,
        http_client: Client,
    ) -> Self {
        let host_url = host_url.trim_end_matches('/').to_string();
        let plugin_url = plugin_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("{host_url}{HOST_PLUGIN_API_PATH}"));
        Self {
            host_url,
            plugin_url,
            source,
            model,
            http_client,
            plugin_available: OnceCell::new(),
        }
    }

    fn native_url(&self, op: &str) -> String {
        format!("{}{}/{op}", self.host_url, HOST_VECTOR_API_PATH)
    }

    fn plugin_op_url(&self, op: &str) -> String {
        format!("{}/{op}", self.plugin_url)
    }

    async fn plugin_ready(&self) -> bool {
        *self
            .plugin_available
            .get_or_init(|| async {
                let probe = self
                    .http_client
                    .get(self.plugin_op_url("probe"))
                    .timeout(DEFAULT_REQUEST_TIMEOUT)
                    .send()
                    .await;
                match probe {
                    Ok(response) if response.status().is_success() => true,
                    _ => {
                        tracing::warn!(
                            "Extended plugin API unavailable; falling back to the native \
                             vector API (structured chunk metadata will not be stored)"
                        );
                        false
                    }
                }
            })
            .await
    }

    async fn post_json(&self, url: String, payload: Value) -> Result<Value> {
        let response = self
            .http_client
            .post(url)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("host vector API", e))?;

        HttpResponseUtils::check_and_parse(response, "host vector API").await
    }

    fn item_to_retrieved(item: &Value) -> RetrievedChunk {
        let metadata = serde_json::from_value::<ChunkMetadata>(item.clone()).unwrap_or_default();
        RetrievedChunk {
            hash: item.u64_or("hash", 0) as u32,
            score: item.f64_or("score", 0.0) as f32,
            text: item.string_or("text", ""),
            metadata,
        }
    }
}

#[async_trait]
impl VectorBackend for StandardBackend {
    async fn initialize(&self) -> Result<()> {
        self.plugin_ready().await;
        Ok(())
    }

    /// Listing a collection that does not exist answers 200 on some host
    /// versions and 500 on others; either way a response means the API is
    /// alive. Only transport failures count as down.
    async fn health_check(&self) -> Result<bool> {
        let payload = json!({
            "collectionId": "vecthare_healthcheck_missing",
            "source": self.source,
        });
        let response = self
            .http_client
            .post(self.native_url("list"))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await;

        Ok(response.is_ok())
    }

    async fn saved_hashes(&self, collection: &CollectionId) -> Result<Vec<u32>> {
        let payload = json!({
            "collectionId": collection.legacy_string(),
            "source": self.source,
        });
        let response = self.post_json(self.native_url("list"), payload).await?;
        let hashes = response
            .as_array()
            .or_else(|| response["hashes"].as_array())
            .ok_or_else(|| Error::protocol("host list response missing hashes"))?;

        Ok(hashes
            .iter()
            .take(LIST_LIMIT)
            .filter_map(|v| v.as_u64())
            .map(|v| v as u32)
            .collect())
    }

    async fn insert_chunks(&self, collection: &CollectionId, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let result = if self.plugin_ready().await {
            let items: Vec<Value> = chunks
                .iter()
                .map(|c| {
                    json!({
                        "hash": c.hash,
                        "text": c.text,
                        "index": c.index,
                        "metadata": serde_json::to_value(&c.metadata).unwrap_or(Value::Null),
                    })
                })
                .collect();
            let payload = json!({
                "collectionId": collection.legacy_string(),
                "source": self.source,
                "model": self.model,
                "items": items,
            });
            self.post_json(self.plugin_op_url("insert"), payload).await
        } else {
            // The native API cannot carry structured metadata; keywords are
            // folded into the searchable text instead
            let items: Vec<Value> = chunks
                .iter()
                .map(|c| {
                    json!({
                        "hash": c.hash,
                        "text": c.text_with_embedded_keywords(),
                        "index": c.index,
                    })
                })
                .collect();
            let payload = json!({
                "collectionId": collection.legacy_string(),
                "source": self.source,
                "items": items,
            });
            self.post_json(self.native_url("insert"), payload).await
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Some(mismatch) = parse_dimension_error(collection, &e.to_string()) {
                    return Err(mismatch);
                }
                Err(e)
            }
        }
    }

    async fn delete_hashes(&self, collection: &CollectionId, hashes: &[u32]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let payload = json!({
            "collectionId": collection.legacy_string(),
            "source": self.source,
            "hashes": hashes,
        });
        self.post_json(self.native_url("delete"), payload).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionId,
        request: &QueryRequest,
    ) -> Result<CollectionQueryResult> {
        let search_text = request.input.text().ok_or_else(|| {
            Error::invalid_argument("The standard backend queries by text; it embeds host-side")
        })?;

        let (url, payload) = if self.plugin_ready().await {
            (
                self.plugin_op_url("query"),
                json!({
                    "collectionId": collection.legacy_string(),
                    "source": self.source,
                    "searchText": search_text,
                    "topK": request.top_k,
                    "threshold": request.score_threshold,
                }),
            )
        } else {
            (
                self.native_url("query"),
                json!({
                    "collectionId": collection.legacy_string(),
                    "source": self.source,
                    "searchText": search_text,
                    "topK": request.top_k,
                    "threshold": request.score_threshold,
                }),
            )
        };

        let response = self.post_json(url, payload).await?;
        let empty = Vec::new();
        let raw_items = response["metadata"].as_array().unwrap_or(&empty);
        let items: Vec<RetrievedChunk> = raw_items
            .iter()
            .map(Self::item_to_retrieved)
            .filter(|item| item.score >= request.score_threshold)
            .collect();

        Ok(CollectionQueryResult::from_items(items, false))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionId>> {
        if !self.plugin_ready().await {
            return Ok(Vec::new());
        }
        let response = self
            .post_json(self.plugin_op_url("collections"), json!({}))
            .await?;
        let empty = Vec::new();
        let names = response
            .as_array()
            .or_else(|| response["collections"].as_array())
            .unwrap_or(&empty);
        Ok(names
            .iter()
            .filter_map(|v| v.as_str())
            .filter_map(|name| CollectionId::parse(name).ok())
            .collect())
    }

    async fn purge(&self, collection: &CollectionId) -> Result<()> {
        tracing::info!(
            "Purging {} collection '{}' from the standard backend",
            collection.kind(),
            collection.source_id()
        );
        let payload = json!({ "collectionId": collection.legacy_string() });
        self.post_json(self.native_url("purge"), payload).await?;
        Ok(())
    }

    async fn purge_all(&self) -> Result<()> {
        self.post_json(self.native_url("purge-all"), json!({})).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "standard"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

/// Factory function for creating standard backend instances.
fn standard_factory(
    config: &VectorBackendConfig,
) -> std::result::Result<Arc<dyn VectorBackend>, String> {
    let host_url = config
        .host_url
        .clone()
        .unwrap_or_else(|| "http://localhost:8000".to_string());
    let source = config
        .embedding_source
        .clone()
        .unwrap_or_else(|| "transformers".to_string());
    let model = config.embedding_model.clone().unwrap_or_default();
    let http_client = Client::builder()
        .timeout(config.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    Ok(Arc::new(StandardBackend::new(
        host_url,
        config.plugin_url.clone(),
        source,
        model,
        http_client,
    )))
}

#[linkme::distributed_slice(VECTOR_BACKENDS)]
static STANDARD_BACKEND: VectorBackendEntry = VectorBackendEntry {
    kind: BackendKind::Standard,
    description: "Host-native file-backed vector store (plugin-extended when available)",
    factory: standard_factory,
};
