//! Qdrant vector backend
//!
//! REST transport against a Qdrant server, in one of two layouts selected
//! by a single flag:
//!
//! - *separate-collection mode* (default): one physical collection per
//!   logical ID, named with the flat `vecthare_{type}_{sourceId}` form
//! - *multitenancy mode*: a single shared `vecthare_multitenancy`
//!   collection where every point carries `content_type = <logicalId>` and
//!   every read and write filters on it
//!
//! Inserts are batched at 100 points per request to stay under the server
//! payload limit. Hybrid search uses the Query API with RRF fusion; when
//! the server cannot serve it, results degrade to dense-only and say so.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use vecthare_application::registry::{
    QdrantSettings, VECTOR_BACKENDS, VectorBackendConfig, VectorBackendEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{EmbeddingProvider, VectorBackend};
use vecthare_domain::value_objects::{
    BackendKind, Chunk, ChunkMetadata, CollectionId, CollectionQueryResult, HybridOptions,
    MULTITENANCY_COLLECTION, QueryInput, QueryRequest, RetrievedChunk,
};

use crate::constants::{
    CONTENT_TYPE_JSON, DEFAULT_REQUEST_TIMEOUT, LIST_LIMIT, QDRANT_DEFAULT_PORT,
    QDRANT_INSERT_BATCH,
};
use crate::utils::JsonExt;

use super::{parse_dimension_error, validate_batch_dimensions};

/// Qdrant vector backend
pub struct QdrantBackend {
    base_url: String,
    api_key: Option<String>,
    multitenancy: bool,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    http_client: Client,
}

/// Assemble the server URL from settings: a full URL wins, otherwise
/// host/port with the scheme picked by the cloud flag.
pub fn assemble_url(settings: &QdrantSettings) -> Result<String> {
    if let Some(url) = settings.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        reqwest::Url::parse(url)
            .map_err(|e| Error::config(format!("Qdrant URL '{url}' is invalid: {e}")))?;
        return Ok(url.trim_end_matches('/').to_string());
    }

    let host = settings
        .host
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::config("Qdrant requires a URL or host"))?;
    let scheme = if settings.use_cloud { "https" } else { "http" };
    let port = settings.port.unwrap_or(QDRANT_DEFAULT_PORT);
    Ok(format!("{scheme}://{host}:{port}"))
}

/// The physical collection a logical ID maps to
pub fn physical_collection_name(multitenancy: bool, collection: &CollectionId) -> String {
    if multitenancy {
        MULTITENANCY_COLLECTION.to_string()
    } else {
        collection.legacy_string()
    }
}

/// The tenant filter every operation carries in multitenancy mode
pub fn tenant_filter(multitenancy: bool, collection: &CollectionId) -> Option<Value> {
    if multitenancy {
        Some(json!({
            "must": [
                { "key": "content_type", "match": { "value": collection.to_string() } }
            ]
        }))
    } else {
        None
    }
}

/// Build the point objects for an insert batch
pub fn build_points(multitenancy: bool, collection: &CollectionId, chunks: &[Chunk]) -> Vec<Value> {
    chunks
        .iter()
        .map(|chunk| {
            let mut payload = json!({
                "hash": chunk.hash,
                "text": chunk.text,
                "index": chunk.index,
                "metadata": serde_json::to_value(&chunk.metadata).unwrap_or(Value::Null),
            });
            if multitenancy {
                payload["content_type"] = Value::String(collection.to_string());
            }
            json!({
                "id": chunk.hash,
                "vector": chunk.vector,
                "payload": payload,
            })
        })
        .collect()
}

impl QdrantBackend {
    /// Create a new Qdrant backend
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        multitenancy: bool,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        http_client: Client,
    ) -> Self {
        Self {
            base_url,
            api_key,
            multitenancy,
            embedder,
            http_client,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http_client
            .request(method, format!("{}{path}", self.base_url))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .timeout(DEFAULT_REQUEST_TIMEOUT);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| crate::utils::HttpResponseUtils::transport_error("Qdrant", e))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or(Value::Null);

        if !status.is_success() {
            let detail = body["status"]["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            return Err(match status.as_u16() {
                401 | 403 => Error::config(format!("Qdrant authentication failed: {detail}")),
                500..=599 => Error::transient_backend(format!("Qdrant server error: {detail}")),
                _ => Error::protocol(format!("Qdrant request failed ({status}): {detail}")),
            });
        }

        Ok(body)
    }

    async fn collection_dimensions(&self, physical: &str) -> Result<Option<usize>> {
        let response = self
            .request(reqwest::Method::GET, &format!("/collections/{physical}"))
            .send()
            .await
            .map_err(|e| crate::utils::HttpResponseUtils::transport_error("Qdrant", e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::protocol(format!("Qdrant collection info parse failed: {e}")))?;
        Ok(body["result"]["config"]["params"]["vectors"]["size"]
            .as_u64()
            .map(|v| v as usize))
    }

    async fn ensure_collection(&self, physical: &str, dimensions: usize) -> Result<()> {
        if self.collection_dimensions(physical).await?.is_some() {
            return Ok(());
        }
        let payload = json!({
            "vectors": { "size": dimensions, "distance": "Cosine" }
        });
        self.send(
            self.request(reqwest::Method::PUT, &format!("/collections/{physical}"))
                .json(&payload),
        )
        .await?;
        tracing::info!("Created Qdrant collection '{physical}' ({dimensions} dimensions)");
        Ok(())
    }

    async fn query_vector(&self, input: &QueryInput) -> Result<Vec<f32>> {
        match input {
            QueryInput::Vector(v) => Ok(v.clone()),
            QueryInput::Text(text) => {
                let embedder = self.embedder.as_ref().ok_or_else(|| {
                    Error::config("Qdrant text queries need an embedding provider")
                })?;
                Ok(embedder.embed(text).await?.vector)
            }
        }
    }

    fn point_to_retrieved(point: &Value) -> RetrievedChunk {
        let payload = &point["payload"];
        let metadata = payload
            .get("metadata")
            .and_then(|m| serde_json::from_value::<ChunkMetadata>(m.clone()).ok())
            .unwrap_or_default();
        RetrievedChunk {
            hash: payload
                .opt_u64("hash")
                .or_else(|| point["id"].as_u64())
                .unwrap_or(0) as u32,
            score: point["score"].as_f64().unwrap_or(0.0) as f32,
            text: payload.string_or("text", ""),
            metadata,
        }
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = self.request(reqwest::Method::GET, "/collections").send().await;
        Ok(response.is_ok_and(|r| r.status().is_success()))
    }

    async fn saved_hashes(&self, collection: &CollectionId) -> Result<Vec<u32>> {
        let physical = physical_collection_name(self.multitenancy, collection);
        if self.collection_dimensions(&physical).await?.is_none() {
            return Ok(Vec::new());
        }

        let mut payload = json!({
            "limit": LIST_LIMIT,
            "with_payload": ["hash"],
            "with_vector": false,
        });
        if let Some(filter) = tenant_filter(self.multitenancy, collection) {
            payload["filter"] = filter;
        }

        let response = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{physical}/points/scroll"),
                )
                .json(&payload),
            )
            .await?;

        let empty = Vec::new();
        let points = response["result"]["points"].as_array().unwrap_or(&empty);
        Ok(points
            .iter()
            .filter_map(|p| p["payload"].opt_u64("hash").or_else(|| p["id"].as_u64()))
            .map(|v| v as u32)
            .collect())
    }

    async fn insert_chunks(&self, collection: &CollectionId, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let physical = physical_collection_name(self.multitenancy, collection);

        // Validate against stored dimensions before anything is written, so
        // a model switch cannot leave a partial batch behind
        let existing = self.collection_dimensions(&physical).await?;
        let batch_dims = validate_batch_dimensions(collection, chunks, existing)?
            .ok_or_else(|| Error::invalid_argument("Qdrant inserts need client-side vectors"))?;
        if existing.is_none() {
            self.ensure_collection(&physical, batch_dims).await?;
        }

        // 100-point batches keep each request under the payload limit
        for window in chunks.chunks(QDRANT_INSERT_BATCH) {
            let payload = json!({ "points": build_points(self.multitenancy, collection, window) });
            let result = self
                .send(
                    self.request(
                        reqwest::Method::PUT,
                        &format!("/collections/{physical}/points?wait=true"),
                    )
                    .json(&payload),
                )
                .await;
            if let Err(e) = result {
                if let Some(mismatch) = parse_dimension_error(collection, &e.to_string()) {
                    return Err(mismatch);
                }
                return Err(e);
            }
        }

        Ok(())
    }

    async fn delete_hashes(&self, collection: &CollectionId, hashes: &[u32]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let physical = physical_collection_name(self.multitenancy, collection);

        let payload = if self.multitenancy {
            // Scoped to the tenant; ids are shared across logical collections
            json!({
                "filter": {
                    "must": [
                        { "key": "content_type", "match": { "value": collection.to_string() } },
                        { "key": "hash", "match": { "any": hashes } }
                    ]
                }
            })
        } else {
            json!({ "points": hashes })
        };

        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/collections/{physical}/points/delete?wait=true"),
            )
            .json(&payload),
        )
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionId,
        request: &QueryRequest,
    ) -> Result<CollectionQueryResult> {
        let physical = physical_collection_name(self.multitenancy, collection);
        if self.collection_dimensions(&physical).await?.is_none() {
            return Ok(CollectionQueryResult::default());
        }

        let vector = self.query_vector(&request.input).await?;
        let mut payload = json!({
            "vector": vector,
            "limit": request.top_k,
            "score_threshold": request.score_threshold,
            "with_payload": true,
        });
        if let Some(filter) = tenant_filter(self.multitenancy, collection) {
            payload["filter"] = filter;
        }

        let response = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{physical}/points/search"),
                )
                .json(&payload),
            )
            .await?;

        let empty = Vec::new();
        let points = response["result"].as_array().unwrap_or(&empty);
        let items = points.iter().map(Self::point_to_retrieved).collect();
        Ok(CollectionQueryResult::from_items(items, false))
    }

    fn supports_hybrid_search(&self) -> bool {
        true
    }

    async fn hybrid_query(
        &self,
        collection: &CollectionId,
        request: &QueryRequest,
        options: &HybridOptions,
    ) -> Result<CollectionQueryResult> {
        let physical = physical_collection_name(self.multitenancy, collection);
        if self.collection_dimensions(&physical).await?.is_none() {
            return Ok(CollectionQueryResult::default());
        }

        let vector = self.query_vector(&request.input).await?;
        let base_filter = tenant_filter(self.multitenancy, collection);

        // Dense prefetch plus a text-constrained dense prefetch, fused
        // server-side with RRF
        let mut dense_prefetch = json!({
            "query": vector,
            "limit": request.top_k * 2,
        });
        let mut text_prefetch = json!({
            "query": vector,
            "limit": request.top_k * 2,
            "filter": {
                "must": [ { "key": "text", "match": { "text": options.text } } ]
            }
        });
        if let Some(filter) = &base_filter {
            dense_prefetch["filter"] = filter.clone();
            if let Some(must) = text_prefetch["filter"]["must"].as_array_mut() {
                must.insert(
                    0,
                    json!({ "key": "content_type", "match": { "value": collection.to_string() } }),
                );
            }
        }

        let payload = json!({
            "prefetch": [dense_prefetch, text_prefetch],
            "query": { "fusion": "rrf" },
            "limit": request.top_k,
            "with_payload": true,
        });

        let native = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{physical}/points/query"),
                )
                .json(&payload),
            )
            .await;

        match native {
            Ok(response) => {
                let empty = Vec::new();
                let points = response["result"]["points"].as_array().unwrap_or(&empty);
                let items = points.iter().map(Self::point_to_retrieved).collect();
                Ok(CollectionQueryResult::from_items(items, true))
            }
            Err(e) => {
                // Older servers have no Query API; degrade to dense-only and
                // annotate the downgrade
                tracing::warn!("Qdrant native hybrid failed, using dense-only: {e}");
                let mut result = self.query(collection, request).await?;
                result.hybrid_search = false;
                Ok(result)
            }
        }
    }

    async fn list_collections(&self) -> Result<Vec<CollectionId>> {
        if self.multitenancy {
            // Tenants live inside the shared collection; recover the logical
            // IDs from the content_type payloads
            let payload = json!({
                "limit": LIST_LIMIT,
                "with_payload": ["content_type"],
                "with_vector": false,
            });
            let response = self
                .send(
                    self.request(
                        reqwest::Method::POST,
                        &format!("/collections/{MULTITENANCY_COLLECTION}/points/scroll"),
                    )
                    .json(&payload),
                )
                .await;
            let Ok(response) = response else {
                return Ok(Vec::new());
            };
            let empty = Vec::new();
            let points = response["result"]["points"].as_array().unwrap_or(&empty);
            let mut ids: Vec<CollectionId> = points
                .iter()
                .filter_map(|p| p["payload"].opt_str("content_type"))
                .filter_map(|raw| CollectionId::parse(raw).ok())
                .collect();
            ids.sort_by_key(|id| id.to_string());
            ids.dedup();
            return Ok(ids);
        }

        let response = self.send(self.request(reqwest::Method::GET, "/collections")).await?;
        let empty = Vec::new();
        let names = response["result"]["collections"].as_array().unwrap_or(&empty);
        Ok(names
            .iter()
            .filter_map(|c| c.opt_str("name"))
            .filter_map(|name| CollectionId::parse(name).ok())
            .collect())
    }

    async fn purge(&self, collection: &CollectionId) -> Result<()> {
        tracing::info!(
            "Purging {} collection '{}' from Qdrant",
            collection.kind(),
            collection.source_id()
        );
        if self.multitenancy {
            let payload = json!({
                "filter": tenant_filter(true, collection),
            });
            self.send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{MULTITENANCY_COLLECTION}/points/delete?wait=true"),
                )
                .json(&payload),
            )
            .await?;
        } else {
            let physical = physical_collection_name(false, collection);
            self.send(
                self.request(reqwest::Method::DELETE, &format!("/collections/{physical}")),
            )
            .await?;
        }
        Ok(())
    }

    async fn purge_all(&self) -> Result<()> {
        let response = self.send(self.request(reqwest::Method::GET, "/collections")).await?;
        let empty = Vec::new();
        let names: Vec<String> = response["result"]["collections"]
            .as_array()
            .unwrap_or(&empty)
            .iter()
            .filter_map(|c| c.opt_str("name"))
            .filter(|name| name.starts_with("vecthare_"))
            .map(str::to_string)
            .collect();

        for name in names {
            self.send(self.request(reqwest::Method::DELETE, &format!("/collections/{name}")))
                .await?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

/// Factory function for creating Qdrant backend instances.
fn qdrant_factory(
    config: &VectorBackendConfig,
) -> std::result::Result<Arc<dyn VectorBackend>, String> {
    let base_url = assemble_url(&config.qdrant).map_err(|e| e.to_string())?;
    let http_client = Client::builder()
        .timeout(config.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    Ok(Arc::new(QdrantBackend::new(
        base_url,
        config.qdrant.api_key.clone(),
        config.qdrant.multitenancy,
        config.embedder.clone(),
        http_client,
    )))
}

#[linkme::distributed_slice(VECTOR_BACKENDS)]
static QDRANT_BACKEND: VectorBackendEntry = VectorBackendEntry {
    kind: BackendKind::Qdrant,
    description: "Qdrant remote vector database (separate-collection or multitenancy layout)",
    factory: qdrant_factory,
};
