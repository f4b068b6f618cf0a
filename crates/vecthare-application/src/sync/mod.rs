//! Sync controller
//!
//! Keeps each collection's stored vectors in step with its source text.
//! Every host chat event lands here as a notification; a per-collection
//! worker debounces, diffs hashes, embeds what is new, and deletes what is
//! gone. Events arriving during an in-flight sync coalesce into exactly one
//! follow-up run.

mod plan;
mod rate_limit;

pub use plan::{SyncPlan, plan_sync};
pub use rate_limit::RateLimiter;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use vecthare_domain::error::{Error, Result};
use vecthare_domain::value_objects::{BackendKind, Chunk, CollectionId};

use crate::backends::BackendRegistry;
use crate::collections::CollectionRegistry;
use crate::embedding::EmbeddingGateway;
use crate::registry::{EmbeddingProviderConfig, VectorBackendConfig};

/// Produces the desired chunk set for a collection from current host state
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Chunk the collection's source text as it stands right now
    async fn current_chunks(&self, collection: &CollectionId) -> Result<Vec<Chunk>>;
}

/// What a sync run changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Chunks inserted
    pub inserted: usize,
    /// Chunks deleted
    pub deleted: usize,
}

/// Sync configuration for the active backend/provider pair
#[derive(Clone)]
pub struct SyncConfig {
    /// Backend the vectors go to
    pub backend: BackendKind,
    /// Backend transport settings
    pub backend_config: VectorBackendConfig,
    /// Embedding source for client-side vectors
    pub embedding: EmbeddingProviderConfig,
    /// Calls allowed per rate-limit window
    pub rate_limit_calls: u32,
    /// Rate-limit window
    pub rate_limit_interval: Duration,
    /// Quiet time after an event before the sync runs
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Standard,
            backend_config: VectorBackendConfig::default(),
            embedding: EmbeddingProviderConfig::default(),
            rate_limit_calls: 5,
            rate_limit_interval: Duration::from_secs(60),
            debounce: Duration::from_millis(300),
        }
    }
}

struct Worker {
    notify: Arc<Notify>,
    pending: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Serializes sync runs per collection and coalesces bursts of events
pub struct SyncController {
    registry: Arc<BackendRegistry>,
    gateway: Arc<EmbeddingGateway>,
    collections: Arc<CollectionRegistry>,
    source: Arc<dyn ChunkSource>,
    limiter: RateLimiter,
    config: SyncConfig,
    workers: DashMap<String, Worker>,
}

impl SyncController {
    /// Create a controller over the shared registries
    pub fn new(
        registry: Arc<BackendRegistry>,
        gateway: Arc<EmbeddingGateway>,
        collections: Arc<CollectionRegistry>,
        source: Arc<dyn ChunkSource>,
        config: SyncConfig,
    ) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_calls, config.rate_limit_interval);
        Self {
            registry,
            gateway,
            collections,
            source,
            limiter,
            config,
            workers: DashMap::new(),
        }
    }

    /// Signal that a collection's source changed.
    ///
    /// Returns immediately. The collection's worker picks the event up
    /// after the debounce window; events landing mid-sync fold into one
    /// follow-up run.
    pub fn notify(self: &Arc<Self>, collection: &CollectionId) {
        use dashmap::mapref::entry::Entry;

        match self.workers.entry(collection.to_string()) {
            Entry::Occupied(worker) => {
                worker.get().pending.store(true, Ordering::SeqCst);
                worker.get().notify.notify_one();
            }
            Entry::Vacant(slot) => {
                let notify = Arc::new(Notify::new());
                let pending = Arc::new(AtomicBool::new(true));
                let task = tokio::spawn(worker_loop(
                    Arc::clone(self),
                    collection.clone(),
                    Arc::clone(&notify),
                    Arc::clone(&pending),
                ));
                notify.notify_one();
                slot.insert(Worker {
                    notify,
                    pending,
                    task,
                });
            }
        }
    }

    /// Run one sync for a collection right now.
    ///
    /// This is the body the workers execute; it is public so diagnostics
    /// and tests can drive a sync without the event machinery.
    pub async fn sync_now(&self, collection: &CollectionId) -> Result<SyncOutcome> {
        let backend = self
            .registry
            .acquire(self.config.backend, &self.config.backend_config, true)
            .await?
            .ok_or_else(|| {
                Error::transient_backend(format!(
                    "Backend '{}' unavailable for sync",
                    self.config.backend
                ))
            })?;

        let saved = match backend.saved_hashes(collection).await {
            Ok(hashes) => hashes,
            Err(e) => return Err(self.note_backend_error(e).await),
        };
        let desired = self.source.current_chunks(collection).await?;
        let plan = plan_sync(&saved, desired);
        if plan.is_empty() {
            tracing::debug!("Collection '{collection}' already in sync");
            return Ok(SyncOutcome::default());
        }
        tracing::info!(
            "Syncing '{}': {} to insert, {} to delete",
            collection,
            plan.to_insert.len(),
            plan.to_delete.len()
        );

        let deleted = plan.to_delete.len();
        if !plan.to_delete.is_empty() {
            self.limiter.acquire().await;
            if let Err(e) = backend.delete_hashes(collection, &plan.to_delete).await {
                return Err(self.note_backend_error(e).await);
            }
            self.registry.metrics().record_delete(self.config.backend);
        }

        let inserted = plan.to_insert.len();
        let batch_size = EmbeddingGateway::sync_batch_size(&self.config.embedding.source);
        for batch in plan.to_insert.chunks(batch_size.max(1)) {
            let embedded = self.embed_batch(batch).await?;
            self.limiter.acquire().await;
            if let Err(e) = backend.insert_chunks(collection, &embedded).await {
                return Err(self.note_backend_error(e).await);
            }
            self.registry.metrics().record_insert(self.config.backend);
        }

        // Keep the registry's chunk count roughly current; a collection that
        // was never registered is not an error here
        let total = saved.len() + inserted - deleted.min(saved.len());
        let _ = self
            .collections
            .set_metadata(collection, |m| m.chunk_count = total)
            .await;

        Ok(SyncOutcome { inserted, deleted })
    }

    /// Stop all workers
    pub fn shutdown(&self) {
        for worker in self.workers.iter() {
            worker.task.abort();
        }
        self.workers.clear();
    }

    /// Embed a batch of chunks client-side, leaving server-side-embedded
    /// chunks untouched when the provider declines.
    async fn embed_batch(&self, chunks: &[Chunk]) -> Result<Vec<Chunk>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let started = Instant::now();
        let vectors = match self.gateway.embed(&self.config.embedding, &texts).await {
            Ok(v) => v,
            Err(e @ Error::Oom { .. }) => {
                // Surface tuning guidance; the same batch is never retried
                tracing::error!(
                    "Embedding ran out of memory; lower chunk_size or batch_size and re-sync: {e}"
                );
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(
            "Embedded {} chunks in {:?}",
            texts.len(),
            started.elapsed()
        );

        Ok(chunks
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| chunk.with_vector(vector))
            .collect())
    }

    /// Record a backend failure and invalidate its cached health
    async fn note_backend_error(&self, error: Error) -> Error {
        self.registry
            .metrics()
            .record_error(self.config.backend, &error.to_string());
        if error.invalidates_health() {
            self.registry.mark_unhealthy(self.config.backend).await;
        }
        error
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        for worker in self.workers.iter() {
            worker.task.abort();
        }
    }
}

async fn worker_loop(
    controller: Arc<SyncController>,
    collection: CollectionId,
    notify: Arc<Notify>,
    pending: Arc<AtomicBool>,
) {
    loop {
        notify.notified().await;
        tokio::time::sleep(controller.config.debounce).await;
        while pending.swap(false, Ordering::SeqCst) {
            match controller.sync_now(&collection).await {
                Ok(outcome) if outcome.inserted + outcome.deleted > 0 => {
                    tracing::info!(
                        "Synced '{}': +{} -{}",
                        collection,
                        outcome.inserted,
                        outcome.deleted
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Sync of '{collection}' failed: {e}");
                    break;
                }
            }
        }
    }
}
