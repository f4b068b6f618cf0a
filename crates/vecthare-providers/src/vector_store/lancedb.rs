//! LanceDB vector backend
//!
//! Columnar embedded store living host-side; every operation goes through
//! the host plugin's `/lancedb` routes. Unlike the standard backend there
//! is no native fallback: without the plugin this backend is simply down.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use vecthare_application::registry::{
    VECTOR_BACKENDS, VectorBackendConfig, VectorBackendEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::VectorBackend;
use vecthare_domain::value_objects::{
    BackendKind, Chunk, ChunkMetadata, CollectionId, CollectionQueryResult, QueryRequest,
    RetrievedChunk,
};

use crate::constants::{CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT, HOST_PLUGIN_API_PATH, LIST_LIMIT};
use crate::utils::{HttpResponseUtils, JsonExt};

use super::parse_dimension_error;

/// LanceDB backend reached through the host plugin
pub struct LanceDbBackend {
    plugin_url: String,
    source: String,
    model: String,
    http_client: Client,
}

impl LanceDbBackend {
    /// Create a new LanceDB backend
    pub fn new(plugin_url: String, source: String, model: String, http_client: Client) -> Self {
        Self {
            plugin_url: plugin_url.trim_end_matches('/').to_string(),
            source,
            model,
            http_client,
        }
    }

    fn op_url(&self, op: &str) -> String {
        format!("{}/lancedb/{op}", self.plugin_url)
    }

    async fn post_json(&self, op: &str, payload: Value) -> Result<Value> {
        let response = self
            .http_client
            .post(self.op_url(op))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HttpResponseUtils::transport_error("LanceDB plugin", e))?;

        HttpResponseUtils::check_and_parse(response, "LanceDB plugin").await
    }
}

#[async_trait]
impl VectorBackend for LanceDbBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = self
            .http_client
            .get(self.op_url("probe"))
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .send()
            .await;
        Ok(response.is_ok_and(|r| r.status().is_success()))
    }

    async fn saved_hashes(&self, collection: &CollectionId) -> Result<Vec<u32>> {
        let payload = json!({
            "collectionId": collection.to_string(),
            "source": self.source,
            "limit": LIST_LIMIT,
        });
        let response = self.post_json("list", payload).await?;
        let hashes = response
            .as_array()
            .or_else(|| response["hashes"].as_array())
            .ok_or_else(|| Error::protocol("LanceDB list response missing hashes"))?;

        Ok(hashes
            .iter()
            .filter_map(|v| v.as_u64())
            .map(|v| v as u32)
            .collect())
    }

    async fn insert_chunks(&self, collection: &CollectionId, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let items: Vec<Value> = chunks
            .iter()
            .map(|c| {
                json!({
                    "hash": c.hash,
                    "text": c.text,
                    "index": c.index,
                    "vector": c.vector,
                    "metadata": serde_json::to_value(&c.metadata).unwrap_or(Value::Null),
                })
            })
            .collect();
        let payload = json!({
            "collectionId": collection.to_string(),
            "source": self.source,
            "model": self.model,
            "items": items,
        });

        match self.post_json("insert", payload).await {
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
            "collectionId": collection.to_string(),
            "hashes": hashes,
        });
        self.post_json("delete", payload).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionId,
        request: &QueryRequest,
    ) -> Result<CollectionQueryResult> {
        let payload = json!({
            "collectionId": collection.to_string(),
            "source": self.source,
            "searchText": request.input.text(),
            "vector": request.input.vector(),
            "topK": request.top_k,
            "threshold": request.score_threshold,
        });

        let response = self.post_json("query", payload).await?;
        let empty = Vec::new();
        let raw_items = response["items"]
            .as_array()
            .or_else(|| response["metadata"].as_array())
            .unwrap_or(&empty);

        let items: Vec<RetrievedChunk> = raw_items
            .iter()
            .map(|item| RetrievedChunk {
                hash: item.u64_or("hash", 0) as u32,
                score: item.f64_or("score", 0.0) as f32,
                text: item.string_or("text", ""),
                metadata: item
                    .get("metadata")
                    .and_then(|m| serde_json::from_value::<ChunkMetadata>(m.clone()).ok())
                    .unwrap_or_default(),
            })
            .filter(|item| item.score >= request.score_threshold)
            .collect();

        Ok(CollectionQueryResult::from_items(items, false))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionId>> {
        let response = self.post_json("collections", json!({})).await?;
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
            "Purging {} collection '{}' from LanceDB",
            collection.kind(),
            collection.source_id()
        );
        let payload = json!({ "collectionId": collection.to_string() });
        self.post_json("purge", payload).await?;
        Ok(())
    }

    async fn purge_all(&self) -> Result<()> {
        self.post_json("purge-all", json!({})).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "lancedb"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

/// Factory function for creating LanceDB backend instances.
fn lancedb_factory(
    config: &VectorBackendConfig,
) -> std::result::Result<Arc<dyn VectorBackend>, String> {
    let plugin_url = config.plugin_url.clone().unwrap_or_else(|| {
        let host = config
            .host_url
            .clone()
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        format!("{}{}", host.trim_end_matches('/'), HOST_PLUGIN_API_PATH)
    });
    let source = config
        .embedding_source
        .clone()
        .unwrap_or_else(|| "transformers".to_string());
    let model = config.embedding_model.clone().unwrap_or_default();
    let http_client = Client::builder()
        .timeout(config.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    Ok(Arc::new(LanceDbBackend::new(
        plugin_url,
        source,
        model,
        http_client,
    )))
}

#[linkme::distributed_slice(VECTOR_BACKENDS)]
static LANCEDB_BACKEND: VectorBackendEntry = VectorBackendEntry {
    kind: BackendKind::LanceDb,
    description: "Columnar embedded vector store via the host plugin",
    factory: lancedb_factory,
};
