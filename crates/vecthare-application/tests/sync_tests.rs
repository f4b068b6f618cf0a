//! Sync controller end-to-end: hash diffing against a mock backend, embed
//! batching through a mock provider, and event coalescing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use vecthare_application::backends::BackendRegistry;
use vecthare_application::collections::CollectionRegistry;
use vecthare_application::embedding::EmbeddingGateway;
use vecthare_application::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry, VECTOR_BACKENDS,
    VectorBackendEntry,
};
use vecthare_application::sync::{ChunkSource, SyncConfig, SyncController};
use vecthare_domain::error::Result;
use vecthare_domain::ports::{EmbeddingProvider, SettingsStore, VectorBackend};
use vecthare_domain::value_objects::{
    BackendKind, Chunk, ChunkMetadata, CollectionId, CollectionQueryResult, Embedding,
    QueryRequest,
};

/// Serializes the tests in this file; they share the mock store below
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Stored hashes per collection, shared between the mock backend instances
static STORE: Mutex<Option<HashMap<String, Vec<u32>>>> = Mutex::new(None);
static EMBED_CALLS: AtomicUsize = AtomicUsize::new(0);

fn store() -> std::sync::MutexGuard<'static, Option<HashMap<String, Vec<u32>>>> {
    STORE.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

struct MemoryBackend;

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn saved_hashes(&self, collection: &CollectionId) -> Result<Vec<u32>> {
        Ok(store()
            .get_or_insert_with(HashMap::new)
            .get(&collection.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_chunks(&self, collection: &CollectionId, chunks: &[Chunk]) -> Result<()> {
        assert!(
            chunks.iter().all(|c| c.vector.is_some()),
            "sync must embed before inserting"
        );
        let mut guard = store();
        let entry = guard
            .get_or_insert_with(HashMap::new)
            .entry(collection.to_string())
            .or_default();
        for chunk in chunks {
            if !entry.contains(&chunk.hash) {
                entry.push(chunk.hash);
            }
        }
        Ok(())
    }

    async fn delete_hashes(&self, collection: &CollectionId, hashes: &[u32]) -> Result<()> {
        let mut guard = store();
        if let Some(entry) = guard
            .get_or_insert_with(HashMap::new)
            .get_mut(&collection.to_string())
        {
            entry.retain(|h| !hashes.contains(h));
        }
        Ok(())
    }

    async fn query(
        &self,
        _collection: &CollectionId,
        _request: &QueryRequest,
    ) -> Result<CollectionQueryResult> {
        Ok(CollectionQueryResult::default())
    }

    async fn purge(&self, collection: &CollectionId) -> Result<()> {
        store()
            .get_or_insert_with(HashMap::new)
            .remove(&collection.to_string());
        Ok(())
    }

    async fn purge_all(&self) -> Result<()> {
        *store() = Some(HashMap::new());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "lancedb"
    }
}

#[linkme::distributed_slice(VECTOR_BACKENDS)]
static MOCK_LANCEDB: VectorBackendEntry = VectorBackendEntry {
    kind: BackendKind::LanceDb,
    description: "in-memory mock backend",
    factory: |_config| Ok(Arc::new(MemoryBackend)),
};

struct MockEmbedder;

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        EMBED_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| Embedding::new(vec![t.len() as f32; 8], "mock-model"))
            .collect())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static MOCK_EMBEDDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "mock",
    description: "fixed-vector mock embedder",
    factory: |_config| Ok(Arc::new(MockEmbedder)),
};

/// Chunk source producing a configurable set of texts
struct TextsSource {
    texts: Mutex<Vec<String>>,
}

#[async_trait]
impl ChunkSource for TextsSource {
    async fn current_chunks(&self, _collection: &CollectionId) -> Result<Vec<Chunk>> {
        Ok(self
            .texts
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(text.clone(), i, ChunkMetadata::with_source("chat")))
            .collect())
    }
}

struct NullStore;

#[async_trait]
impl SettingsStore for NullStore {
    async fn load(&self, _key: &str) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
    async fn save(&self, _key: &str, _value: serde_json::Value) -> Result<()> {
        Ok(())
    }
}

fn controller(texts: Vec<String>) -> (Arc<SyncController>, Arc<TextsSource>) {
    let source = Arc::new(TextsSource {
        texts: Mutex::new(texts),
    });
    let config = SyncConfig {
        backend: BackendKind::LanceDb,
        embedding: EmbeddingProviderConfig::new("mock"),
        rate_limit_calls: 1000,
        rate_limit_interval: Duration::from_secs(1),
        debounce: Duration::from_millis(5),
        ..SyncConfig::default()
    };
    let controller = Arc::new(SyncController::new(
        Arc::new(BackendRegistry::default()),
        Arc::new(EmbeddingGateway::new()),
        Arc::new(CollectionRegistry::new(Arc::new(NullStore))),
        Arc::clone(&source) as Arc<dyn ChunkSource>,
        config,
    ));
    (controller, source)
}

#[tokio::test(flavor = "multi_thread")]
async fn first_sync_inserts_everything() {
    let _guard = test_guard();
    *store() = Some(HashMap::new());
    let collection = CollectionId::new("chat", "sync-insert");
    let (controller, _source) = controller(vec!["alpha".into(), "beta".into()]);

    let outcome = controller.sync_now(&collection).await.unwrap();
    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.deleted, 0);

    let stored = store().as_ref().unwrap()[&collection.to_string()].clone();
    assert_eq!(stored.len(), 2);

    // Re-running against unchanged source is a no-op
    let outcome = controller.sync_now(&collection).await.unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.deleted, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn edits_swap_old_hashes_for_new() {
    let _guard = test_guard();
    *store() = Some(HashMap::new());
    let collection = CollectionId::new("chat", "sync-edit");
    let (controller, source) = controller(vec!["original wording".into(), "stable".into()]);
    controller.sync_now(&collection).await.unwrap();

    *source.texts.lock().unwrap() = vec!["edited wording".into(), "stable".into()];
    let outcome = controller.sync_now(&collection).await.unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.deleted, 1);

    let stored = store().as_ref().unwrap()[&collection.to_string()].clone();
    let edited = Chunk::new("edited wording", 0, ChunkMetadata::default());
    let removed = Chunk::new("original wording", 0, ChunkMetadata::default());
    assert!(stored.contains(&edited.hash));
    assert!(!stored.contains(&removed.hash));
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_source_text_deletes_stored_hashes() {
    let _guard = test_guard();
    *store() = Some(HashMap::new());
    let collection = CollectionId::new("chat", "sync-delete");
    let (controller, source) = controller(vec!["one".into(), "two".into(), "three".into()]);
    controller.sync_now(&collection).await.unwrap();

    source.texts.lock().unwrap().clear();
    let outcome = controller.sync_now(&collection).await.unwrap();
    assert_eq!(outcome.deleted, 3);
    assert!(store().as_ref().unwrap()[&collection.to_string()].is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn notifications_coalesce_into_bounded_runs() {
    let _guard = test_guard();
    *store() = Some(HashMap::new());
    let collection = CollectionId::new("chat", "sync-coalesce");
    let (controller, _source) = controller(vec!["coalesced content".into()]);

    let embeds_before = EMBED_CALLS.load(Ordering::SeqCst);
    for _ in 0..25 {
        controller.notify(&collection);
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    // A burst of notifications produces at most a handful of runs, and only
    // the first run has anything to embed
    let embeds = EMBED_CALLS.load(Ordering::SeqCst) - embeds_before;
    assert!(embeds >= 1, "at least one sync must run");
    assert!(embeds <= 3, "burst must coalesce, saw {embeds} embedding runs");

    let stored = store().as_ref().unwrap()[&collection.to_string()].clone();
    assert_eq!(stored.len(), 1);
    controller.shutdown();
}
