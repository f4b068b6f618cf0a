//! Vector Backend Port
//!
//! The uniform contract every vector store adapter satisfies. Backends
//! differ wildly underneath (a local file tree, a columnar table-set, two
//! remote servers), so the contract is deliberately narrow: hashes in,
//! scored chunks out.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::{
    Chunk, CollectionId, CollectionQueryOutcome, CollectionQueryResult, HybridOptions,
    QueryRequest,
};

/// Uniform Vector Store Contract
///
/// # Example
///
/// ```ignore
/// use vecthare_domain::ports::VectorBackend;
///
/// backend.initialize().await?;
/// if backend.health_check().await? {
///     backend.insert_chunks(&collection, &chunks).await?;
///     let result = backend.query(&collection, &request).await?;
/// }
/// ```
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Establish transport; may be a no-op.
    ///
    /// Called once by the registry before the first health check. Adapters
    /// that probe capabilities (extended plugin APIs, dimension discovery)
    /// do it here.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Cheap liveness probe
    async fn health_check(&self) -> Result<bool>;

    /// All chunk hashes stored in the collection, bounded by the platform
    /// list limit
    async fn saved_hashes(&self, collection: &CollectionId) -> Result<Vec<u32>>;

    /// Upsert chunks by hash. Text is embedded server-side when a chunk
    /// carries no vector and the backend supports it.
    async fn insert_chunks(&self, collection: &CollectionId, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by hash; idempotent
    async fn delete_hashes(&self, collection: &CollectionId, hashes: &[u32]) -> Result<()>;

    /// Query one collection, ordered by descending similarity, scores at or
    /// above the request threshold
    async fn query(
        &self,
        collection: &CollectionId,
        request: &QueryRequest,
    ) -> Result<CollectionQueryResult>;

    /// Fan a query out over several collections.
    ///
    /// One collection's failure never aborts the rest; it becomes an error
    /// outcome in the returned map.
    async fn query_multiple(
        &self,
        collections: &[CollectionId],
        request: &QueryRequest,
    ) -> Result<HashMap<String, CollectionQueryOutcome>> {
        let lookups = collections.iter().map(|c| async move {
            let outcome = match self.query(c, request).await {
                Ok(result) => CollectionQueryOutcome::Ok(result),
                Err(e) => CollectionQueryOutcome::Err(e),
            };
            (c.to_string(), outcome)
        });
        Ok(futures::future::join_all(lookups).await.into_iter().collect())
    }

    /// Logical collections this backend currently holds.
    ///
    /// Backends without a listing endpoint return an empty list; the
    /// collection registry treats that as "nothing to reconcile".
    async fn list_collections(&self) -> Result<Vec<CollectionId>> {
        Ok(Vec::new())
    }

    /// Delete the collection and everything in it
    async fn purge(&self, collection: &CollectionId) -> Result<()>;

    /// Delete every collection this backend holds, where the store makes
    /// that meaningful
    async fn purge_all(&self) -> Result<()>;

    /// Whether the store fuses dense and sparse rankings natively
    fn supports_hybrid_search(&self) -> bool {
        false
    }

    /// Native hybrid query; the default falls back to the dense path
    async fn hybrid_query(
        &self,
        collection: &CollectionId,
        request: &QueryRequest,
        _options: &HybridOptions,
    ) -> Result<CollectionQueryResult> {
        self.query(collection, request).await
    }

    /// Canonical backend name
    fn backend_name(&self) -> &'static str;
}
