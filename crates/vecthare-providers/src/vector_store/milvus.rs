//! Milvus vector backend
//!
//! All tenants share one `vecthare_main` collection; every row carries the
//! logical collection's type and source id, and every operation filters on
//! them. Vector dimensions are discovered at initialization by embedding a
//! probe string, unless the configuration pins them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use milvus::client::Client;
use milvus::data::FieldColumn;
use milvus::mutate::DeleteOptions;
use milvus::proto::schema::DataType;
use milvus::query::{QueryOptions, SearchOptions};
use milvus::schema::{CollectionSchemaBuilder, FieldSchema};
use milvus::value::{Value as MilvusValue, ValueVec};
use std::borrow::Cow;
use tokio::sync::OnceCell;

use vecthare_application::registry::{
    VECTOR_BACKENDS, VectorBackendConfig, VectorBackendEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{EmbeddingProvider, VectorBackend};
use vecthare_domain::value_objects::{
    BackendKind, Chunk, ChunkMetadata, CollectionId, CollectionQueryResult, HybridOptions,
    QueryInput, QueryRequest, RetrievedChunk, SHARED_MAIN_COLLECTION,
};

use crate::constants::{DIMENSION_PROBE_TEXT, LIST_LIMIT, MILVUS_DEFAULT_ADDRESS};

use super::validate_batch_dimensions;

/// Maximum length of the varchar tenant fields
const TENANT_VARCHAR_MAX: i32 = 512;

/// Maximum length of content and metadata varchars
const CONTENT_VARCHAR_MAX: i32 = 65_535;

/// IVF_FLAT cluster count
const IVFFLAT_NLIST: u32 = 128;

/// Connection timeout in seconds
const CONNECT_TIMEOUT_SECS: u64 = 10;

struct MilvusState {
    client: Client,
    dimensions: usize,
}

/// Milvus vector backend over the shared main collection
pub struct MilvusBackend {
    address: String,
    dimensions_override: Option<usize>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    state: OnceCell<MilvusState>,
}

/// Tenant filter expression for a logical collection
pub fn tenant_expr(collection: &CollectionId) -> String {
    format!(
        "kind == \"{}\" && source_id == \"{}\"",
        escape(collection.kind()),
        escape(collection.source_id())
    )
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Helper method to convert Milvus errors to domain errors
fn map_milvus_error<T, E: std::fmt::Display>(
    result: std::result::Result<T, E>,
    operation: &str,
) -> Result<T> {
    result.map_err(|e| Error::transient_backend(format!("Milvus failed to {operation}: {e}")))
}

impl MilvusBackend {
    /// Create a new Milvus backend; the connection opens on `initialize`
    pub fn new(
        address: String,
        dimensions_override: Option<usize>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        // tonic transport requires an explicit scheme
        let address = if address.starts_with("http://") || address.starts_with("https://") {
            address
        } else {
            format!("http://{address}")
        };
        Self {
            address,
            dimensions_override,
            embedder,
            state: OnceCell::new(),
        }
    }

    async fn state(&self) -> Result<&MilvusState> {
        self.state
            .get_or_try_init(|| async {
                let timeout = Duration::from_secs(CONNECT_TIMEOUT_SECS);
                let client = tokio::time::timeout(timeout, Client::new(self.address.clone()))
                    .await
                    .map_err(|_| {
                        Error::network(format!(
                            "Milvus connection timed out after {CONNECT_TIMEOUT_SECS} seconds"
                        ))
                    })?
                    .map_err(|e| {
                        Error::network(format!(
                            "Failed to connect to Milvus at {}: {e}",
                            self.address
                        ))
                    })?;

                let dimensions = match self.dimensions_override {
                    Some(dims) => dims,
                    None => self.discover_dimensions().await?,
                };

                ensure_collection(&client, dimensions).await?;
                Ok(MilvusState { client, dimensions })
            })
            .await
    }

    /// Measure vector length by embedding a probe string
    async fn discover_dimensions(&self) -> Result<usize> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            Error::config(
                "Milvus needs either milvus_dimensions or an embedding provider to discover them",
            )
        })?;
        if let Some(dims) = embedder.dimensions() {
            return Ok(dims);
        }
        let probe = embedder.embed(DIMENSION_PROBE_TEXT).await?;
        if probe.vector.is_empty() {
            return Err(Error::protocol("Dimension probe returned an empty vector"));
        }
        Ok(probe.vector.len())
    }

    /// Embed the query input when it arrives as text
    async fn query_vector(&self, input: &QueryInput) -> Result<Vec<f32>> {
        match input {
            QueryInput::Vector(v) => Ok(v.clone()),
            QueryInput::Text(text) => {
                let embedder = self.embedder.as_ref().ok_or_else(|| {
                    Error::config("Milvus text queries need an embedding provider")
                })?;
                Ok(embedder.embed(text).await?.vector)
            }
        }
    }

    /// Primary-key ids of the tenant's rows matching the given hashes
    async fn tenant_row_ids(
        &self,
        state: &MilvusState,
        collection: &CollectionId,
        hashes: Option<&[u32]>,
    ) -> Result<Vec<i64>> {
        let mut expr = tenant_expr(collection);
        if let Some(hashes) = hashes {
            let list = hashes
                .iter()
                .map(|h| h.to_string())
                .collect::<Vec<_>>()
                .join(",");
            expr = format!("{expr} && hash in [{list}]");
        }

        let options = QueryOptions::new()
            .limit(LIST_LIMIT as i64)
            .output_fields(vec!["id".to_string()]);
        let columns = map_milvus_error(
            state
                .client
                .query(SHARED_MAIN_COLLECTION, &expr, &options)
                .await,
            "query row ids",
        )?;

        let mut ids = Vec::new();
        for column in &columns {
            if column.name == "id" {
                for i in 0..column.len() {
                    if let Some(MilvusValue::Long(id)) = column.get(i) {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }
}

async fn ensure_collection(client: &Client, dimensions: usize) -> Result<()> {
    let exists = map_milvus_error(
        client.has_collection(SHARED_MAIN_COLLECTION).await,
        "check collection",
    )?;
    if exists {
        return Ok(());
    }

    let schema = CollectionSchemaBuilder::new(
        SHARED_MAIN_COLLECTION,
        "Shared VectHare chunk collection",
    )
    .add_field(FieldSchema::new_primary_int64("id", "primary key", true))
    .add_field(FieldSchema::new_int64("hash", "chunk content hash"))
    .add_field(FieldSchema::new_varchar(
        "kind",
        "logical collection type",
        TENANT_VARCHAR_MAX,
    ))
    .add_field(FieldSchema::new_varchar(
        "source_id",
        "logical collection source",
        TENANT_VARCHAR_MAX,
    ))
    .add_field(FieldSchema::new_varchar(
        "content",
        "chunk text",
        CONTENT_VARCHAR_MAX,
    ))
    .add_field(FieldSchema::new_varchar(
        "metadata",
        "chunk metadata JSON",
        CONTENT_VARCHAR_MAX,
    ))
    .add_field(FieldSchema::new_float_vector(
        "vector",
        "chunk embedding",
        dimensions as i64,
    ))
    .build()
    .map_err(|e| Error::transient_backend(format!("Milvus failed to build schema: {e}")))?;

    map_milvus_error(
        client.create_collection(schema, None).await,
        "create collection",
    )?;

    // Wait for Milvus to sync collection metadata
    tokio::time::sleep(Duration::from_millis(500)).await;

    use milvus::index::{IndexParams, IndexType, MetricType};
    let index_params = IndexParams::new(
        "vector_index".to_string(),
        IndexType::IvfFlat,
        MetricType::L2,
        HashMap::from([("nlist".to_string(), IVFFLAT_NLIST.to_string())]),
    );

    // Retry index creation with backoff to ride out eventual consistency
    let mut last_error = None;
    for attempt in 0..3 {
        match client
            .create_index(SHARED_MAIN_COLLECTION, "vector", index_params.clone())
            .await
        {
            Ok(()) => {
                last_error = None;
                break;
            }
            Err(e) => {
                let err_str = e.to_string();
                if err_str.contains("CollectionNotExists") || err_str.contains("not found") {
                    tracing::debug!(
                        "Index creation attempt {} failed (collection not ready), retrying",
                        attempt + 1
                    );
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(500 * (attempt + 1) as u64)).await;
                    continue;
                }
                return Err(Error::transient_backend(format!(
                    "Milvus failed to create index: {e}"
                )));
            }
        }
    }
    if let Some(e) = last_error {
        return Err(Error::transient_backend(format!(
            "Milvus failed to create index after retries: {e}"
        )));
    }

    tracing::info!("Created Milvus collection '{SHARED_MAIN_COLLECTION}' ({dimensions} dimensions)");
    Ok(())
}

#[async_trait]
impl VectorBackend for MilvusBackend {
    async fn initialize(&self) -> Result<()> {
        self.state().await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let state = self.state().await?;
        Ok(state.client.has_collection(SHARED_MAIN_COLLECTION).await.is_ok())
    }

    async fn saved_hashes(&self, collection: &CollectionId) -> Result<Vec<u32>> {
        let state = self.state().await?;
        map_milvus_error(
            state.client.load_collection(SHARED_MAIN_COLLECTION, None).await,
            "load collection",
        )?;

        let options = QueryOptions::new()
            .limit(LIST_LIMIT as i64)
            .output_fields(vec!["hash".to_string()]);
        let columns = map_milvus_error(
            state
                .client
                .query(SHARED_MAIN_COLLECTION, &tenant_expr(collection), &options)
                .await,
            "list hashes",
        )?;

        let mut hashes = Vec::new();
        for column in &columns {
            if column.name == "hash" {
                for i in 0..column.len() {
                    if let Some(MilvusValue::Long(hash)) = column.get(i) {
                        hashes.push(hash as u32);
                    }
                }
            }
        }
        Ok(hashes)
    }

    async fn insert_chunks(&self, collection: &CollectionId, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let state = self.state().await?;

        // Reject a mismatched batch before anything reaches the server
        validate_batch_dimensions(collection, chunks, Some(state.dimensions))?;

        let mut vectors_flat = Vec::with_capacity(chunks.len() * state.dimensions);
        let mut hashes = Vec::with_capacity(chunks.len());
        let mut kinds = Vec::with_capacity(chunks.len());
        let mut source_ids = Vec::with_capacity(chunks.len());
        let mut contents = Vec::with_capacity(chunks.len());
        let mut metadata_json = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let vector = chunk.vector.as_ref().ok_or_else(|| {
                Error::invalid_argument("Milvus inserts need client-side vectors")
            })?;
            vectors_flat.extend_from_slice(vector);
            hashes.push(i64::from(chunk.hash));
            kinds.push(collection.kind().to_string());
            source_ids.push(collection.source_id().to_string());
            contents.push(chunk.text.clone());
            metadata_json.push(
                serde_json::to_string(&chunk.metadata).unwrap_or_else(|_| "{}".to_string()),
            );
        }

        let columns = vec![
            FieldColumn {
                name: "hash".to_string(),
                dtype: DataType::Int64,
                value: ValueVec::Long(hashes),
                dim: 1,
                max_length: 0,
                is_dynamic: false,
            },
            FieldColumn {
                name: "kind".to_string(),
                dtype: DataType::VarChar,
                value: ValueVec::String(kinds),
                dim: 1,
                max_length: TENANT_VARCHAR_MAX,
                is_dynamic: false,
            },
            FieldColumn {
                name: "source_id".to_string(),
                dtype: DataType::VarChar,
                value: ValueVec::String(source_ids),
                dim: 1,
                max_length: TENANT_VARCHAR_MAX,
                is_dynamic: false,
            },
            FieldColumn {
                name: "content".to_string(),
                dtype: DataType::VarChar,
                value: ValueVec::String(contents),
                dim: 1,
                max_length: CONTENT_VARCHAR_MAX,
                is_dynamic: false,
            },
            FieldColumn {
                name: "metadata".to_string(),
                dtype: DataType::VarChar,
                value: ValueVec::String(metadata_json),
                dim: 1,
                max_length: CONTENT_VARCHAR_MAX,
                is_dynamic: false,
            },
            FieldColumn {
                name: "vector".to_string(),
                dtype: DataType::FloatVector,
                value: ValueVec::Float(vectors_flat),
                dim: state.dimensions as i64,
                max_length: 0,
                is_dynamic: false,
            },
        ];

        map_milvus_error(
            state.client.insert(SHARED_MAIN_COLLECTION, columns, None).await,
            "insert chunks",
        )?;
        Ok(())
    }

    async fn delete_hashes(&self, collection: &CollectionId, hashes: &[u32]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let state = self.state().await?;
        map_milvus_error(
            state.client.load_collection(SHARED_MAIN_COLLECTION, None).await,
            "load collection",
        )?;

        // The delete API takes primary keys, so resolve the tenant's rows first
        let ids = self.tenant_row_ids(state, collection, Some(hashes)).await?;
        if ids.is_empty() {
            return Ok(());
        }

        let options = DeleteOptions::with_ids(ValueVec::Long(ids));
        map_milvus_error(
            state.client.delete(SHARED_MAIN_COLLECTION, &options).await,
            "delete chunks",
        )?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionId,
        request: &QueryRequest,
    ) -> Result<CollectionQueryResult> {
        let state = self.state().await?;

        if let Err(e) = state.client.load_collection(SHARED_MAIN_COLLECTION, None).await {
            let err_str = e.to_string();
            if err_str.contains("CollectionNotExists") || err_str.contains("not exist") {
                return Ok(CollectionQueryResult::default());
            }
            return Err(Error::transient_backend(format!(
                "Milvus failed to load collection: {e}"
            )));
        }

        let vector = self.query_vector(&request.input).await?;

        // The SDK search has no filter expression; over-fetch and apply the
        // tenant filter client-side
        let fetch = (request.top_k * 4).max(request.top_k);
        let options = SearchOptions::new()
            .limit(fetch)
            .output_fields(vec![
                "hash".to_string(),
                "kind".to_string(),
                "source_id".to_string(),
                "content".to_string(),
                "metadata".to_string(),
            ])
            .add_param("metric_type", "L2");

        let search_results = match state
            .client
            .search(
                SHARED_MAIN_COLLECTION,
                vec![MilvusValue::FloatArray(Cow::Owned(vector))],
                Some(options),
            )
            .await
        {
            Ok(results) => results,
            Err(e) => {
                let err_str = e.to_string();
                if err_str.contains("no IDs") || err_str.contains("empty") {
                    return Ok(CollectionQueryResult::default());
                }
                return Err(Error::transient_backend(format!("Milvus search failed: {e}")));
            }
        };

        let mut items = Vec::new();
        for result in search_results {
            let mut columns_map = HashMap::new();
            for column in &result.field {
                columns_map.insert(column.name.as_str(), column);
            }

            let get_string = |columns: &HashMap<&str, &FieldColumn>, name: &str, i: usize| {
                columns.get(name).and_then(|col| col.get(i)).map(|v| match v {
                    MilvusValue::String(s) => s.to_string(),
                    _ => String::new(),
                })
            };

            for i in 0..result.score.len() {
                let kind = get_string(&columns_map, "kind", i).unwrap_or_default();
                let source_id = get_string(&columns_map, "source_id", i).unwrap_or_default();
                if kind != collection.kind() || source_id != collection.source_id() {
                    continue;
                }

                let distance = result.score.get(i).copied().unwrap_or(0.0);
                let score = (-distance).exp();
                if score < request.score_threshold {
                    continue;
                }

                let hash = columns_map
                    .get("hash")
                    .and_then(|col| col.get(i))
                    .map(|v| match v {
                        MilvusValue::Long(h) => h as u32,
                        _ => 0,
                    })
                    .unwrap_or(0);
                let text = get_string(&columns_map, "content", i).unwrap_or_default();
                let metadata = get_string(&columns_map, "metadata", i)
                    .and_then(|raw| serde_json::from_str::<ChunkMetadata>(&raw).ok())
                    .unwrap_or_default();

                items.push(RetrievedChunk {
                    hash,
                    score,
                    text,
                    metadata,
                });
            }
        }

        items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        items.truncate(request.top_k);
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
        // Dense leg from the server, keyword leg re-scored over the
        // retrieved texts, combined with the configured weights
        let mut result = self.query(collection, request).await?;
        if result.items.is_empty() || options.text.trim().is_empty() {
            result.hybrid_search = true;
            return Ok(result);
        }

        let query_terms: Vec<String> = options
            .text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        for item in &mut result.items {
            let text_lower = item.text.to_lowercase();
            let matched = query_terms.iter().filter(|t| text_lower.contains(*t)).count();
            let text_score = matched as f32 / query_terms.len().max(1) as f32;
            item.score = options.vector_weight * item.score + options.text_weight * text_score;
        }
        result
            .items
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        result.hashes = result.items.iter().map(|i| i.hash).collect();
        result.hybrid_search = true;
        Ok(result)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionId>> {
        let state = self.state().await?;
        map_milvus_error(
            state.client.load_collection(SHARED_MAIN_COLLECTION, None).await,
            "load collection",
        )?;

        let options = QueryOptions::new()
            .limit(LIST_LIMIT as i64)
            .output_fields(vec!["kind".to_string(), "source_id".to_string()]);
        let columns = map_milvus_error(
            state
                .client
                .query(SHARED_MAIN_COLLECTION, "id >= 0", &options)
                .await,
            "list tenants",
        )?;

        let mut columns_map = HashMap::new();
        for column in &columns {
            columns_map.insert(column.name.as_str(), column);
        }
        let row_count = columns.first().map_or(0, FieldColumn::len);

        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        for i in 0..row_count {
            let kind = columns_map.get("kind").and_then(|c| c.get(i));
            let source_id = columns_map.get("source_id").and_then(|c| c.get(i));
            if let (Some(MilvusValue::String(kind)), Some(MilvusValue::String(source_id))) =
                (kind, source_id)
            {
                if seen.insert((kind.to_string(), source_id.to_string())) {
                    ids.push(CollectionId::new(kind.to_string(), source_id.to_string()));
                }
            }
        }
        Ok(ids)
    }

    async fn purge(&self, collection: &CollectionId) -> Result<()> {
        tracing::info!(
            "Purging {} collection '{}' from Milvus",
            collection.kind(),
            collection.source_id()
        );
        let state = self.state().await?;
        let ids = self.tenant_row_ids(state, collection, None).await?;
        if ids.is_empty() {
            return Ok(());
        }
        let options = DeleteOptions::with_ids(ValueVec::Long(ids));
        map_milvus_error(
            state.client.delete(SHARED_MAIN_COLLECTION, &options).await,
            "purge tenant",
        )?;
        Ok(())
    }

    async fn purge_all(&self) -> Result<()> {
        let state = self.state().await?;
        map_milvus_error(
            state.client.drop_collection(SHARED_MAIN_COLLECTION).await,
            "drop shared collection",
        )?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "milvus"
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

/// Factory function for creating Milvus backend instances.
fn milvus_factory(
    config: &VectorBackendConfig,
) -> std::result::Result<Arc<dyn VectorBackend>, String> {
    let address = config
        .milvus
        .address
        .clone()
        .or_else(|| {
            config.milvus.host.as_ref().map(|host| {
                format!("{host}:{}", config.milvus.port.unwrap_or(19530))
            })
        })
        .unwrap_or_else(|| MILVUS_DEFAULT_ADDRESS.to_string());

    Ok(Arc::new(MilvusBackend::new(
        address,
        config.milvus.dimensions,
        config.embedder.clone(),
    )))
}

#[linkme::distributed_slice(VECTOR_BACKENDS)]
static MILVUS_BACKEND: VectorBackendEntry = VectorBackendEntry {
    kind: BackendKind::Milvus,
    description: "Milvus remote vector database (shared collection with tenant filters)",
    factory: milvus_factory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_expr_escapes_quotes() {
        let id = CollectionId::new("chat", "ab\"c");
        let expr = tenant_expr(&id);
        assert_eq!(expr, "kind == \"chat\" && source_id == \"ab\\\"c\"");
    }

    #[test]
    fn tenant_expr_plain() {
        let id = CollectionId::new("doc", "guide");
        assert_eq!(tenant_expr(&id), "kind == \"doc\" && source_id == \"guide\"");
    }
}
