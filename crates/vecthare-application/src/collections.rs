//! Collection registry
//!
//! The persistent set of known collection IDs and their metadata: backend
//! and embedding lineage, chunk counts, decay overrides, enablement, and
//! activation conditions. Persisted through the host's settings store;
//! reconciled against backend listing endpoints at startup.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{SettingsStore, VectorBackend};
use vecthare_domain::value_objects::{BackendKind, CollectionId, CollectionMetadata};

use crate::retry::{RetryPolicy, with_retry};

/// Settings key the structured registry persists under
const SETTINGS_KEY: &str = "vecthare_collections";

/// Settings key of the legacy flat enabled-flag map
const LEGACY_SETTINGS_KEY: &str = "vecthare_enabled_collections";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedRegistry {
    collections: HashMap<String, CollectionMetadata>,
}

/// Persistent registry of known collections
pub struct CollectionRegistry {
    store: Arc<dyn SettingsStore>,
    collections: RwLock<HashMap<String, CollectionMetadata>>,
}

impl CollectionRegistry {
    /// Create an empty registry over a settings store
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Load the persisted registry, migrating the legacy flat format the
    /// first time it is seen.
    ///
    /// Legacy entries carry only an enabled flag; lineage fields are filled
    /// from the currently configured backend/source/model.
    pub async fn load(
        &self,
        default_backend: BackendKind,
        default_source: &str,
        default_model: &str,
    ) -> Result<()> {
        if let Some(value) = self.store.load(SETTINGS_KEY).await? {
            let persisted: PersistedRegistry = serde_json::from_value(value)?;
            *self.collections.write().await = persisted.collections;
            return Ok(());
        }

        // One-shot migration from the flat enabled-flag map
        if let Some(value) = self.store.load(LEGACY_SETTINGS_KEY).await? {
            let flags: HashMap<String, bool> = serde_json::from_value(value)?;
            let mut migrated = HashMap::new();
            for (raw_id, enabled) in flags {
                let Ok(id) = CollectionId::parse(&raw_id) else {
                    tracing::warn!("Skipping unparseable legacy collection '{raw_id}'");
                    continue;
                };
                let mut metadata =
                    CollectionMetadata::new(id.clone(), default_backend, default_source, default_model);
                metadata.enabled = enabled;
                migrated.insert(id.to_string(), metadata);
            }
            tracing::info!(
                "Migrated {} legacy collection flags to structured metadata",
                migrated.len()
            );
            *self.collections.write().await = migrated;
            self.persist().await?;
        }

        Ok(())
    }

    /// Register a collection, replacing existing metadata for the same ID
    pub async fn register(&self, metadata: CollectionMetadata) -> Result<()> {
        self.collections
            .write()
            .await
            .insert(metadata.id.to_string(), metadata);
        self.persist().await
    }

    /// Remove a collection from the registry
    pub async fn unregister(&self, id: &CollectionId) -> Result<()> {
        self.collections.write().await.remove(&id.to_string());
        self.persist().await
    }

    /// All registered collections
    pub async fn list(&self) -> Vec<CollectionMetadata> {
        self.collections.read().await.values().cloned().collect()
    }

    /// Metadata for one collection
    pub async fn metadata(&self, id: &CollectionId) -> Option<CollectionMetadata> {
        self.collections.read().await.get(&id.to_string()).cloned()
    }

    /// Patch a collection's metadata in place and persist
    pub async fn set_metadata<F>(&self, id: &CollectionId, patch: F) -> Result<()>
    where
        F: FnOnce(&mut CollectionMetadata),
    {
        {
            let mut collections = self.collections.write().await;
            let entry = collections
                .get_mut(&id.to_string())
                .ok_or_else(|| Error::not_found(format!("collection '{id}'")))?;
            patch(entry);
        }
        self.persist().await
    }

    /// Whether a collection exists and is enabled
    pub async fn is_enabled(&self, id: &CollectionId) -> bool {
        self.collections
            .read()
            .await
            .get(&id.to_string())
            .is_some_and(|m| m.enabled)
    }

    /// Whether a collection should participate in a query over `context`
    pub async fn should_activate(&self, id: &CollectionId, context: &str) -> bool {
        self.collections
            .read()
            .await
            .get(&id.to_string())
            .is_some_and(|m| m.should_activate(context))
    }

    /// Reconcile the persisted view with what a backend actually holds.
    ///
    /// Probes the backend's listing endpoint with bounded retry to tolerate
    /// transient unavailability; collections found remotely but missing
    /// locally are registered with the given lineage. Returns how many new
    /// collections were discovered.
    pub async fn discover(
        &self,
        backend: &Arc<dyn VectorBackend>,
        kind: BackendKind,
        source: &str,
        model: &str,
    ) -> Result<usize> {
        let listed = with_retry(RetryPolicy::discovery(), "collection discovery", || {
            let backend = Arc::clone(backend);
            async move { backend.list_collections().await }
        })
        .await?;

        let mut discovered = 0usize;
        {
            let mut collections = self.collections.write().await;
            for id in listed {
                let key = id.to_string();
                if !collections.contains_key(&key) {
                    tracing::info!("Discovered unregistered collection '{key}' on {kind}");
                    collections.insert(
                        key,
                        CollectionMetadata::new(id, kind, source, model),
                    );
                    discovered += 1;
                }
            }
        }
        if discovered > 0 {
            self.persist().await?;
        }
        Ok(discovered)
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = PersistedRegistry {
            collections: self.collections.read().await.clone(),
        };
        let value: Value = serde_json::to_value(&snapshot)?;
        self.store.save(SETTINGS_KEY, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Settings store backed by a plain map
    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, Value>>,
    }

    #[async_trait]
    impl SettingsStore for MemoryStore {
        async fn load(&self, key: &str) -> Result<Option<Value>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn save(&self, key: &str, value: Value) -> Result<()> {
            self.values.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
    }

    fn sample_metadata(id: &str) -> CollectionMetadata {
        CollectionMetadata::new(
            CollectionId::parse(id).unwrap(),
            BackendKind::Standard,
            "transformers",
            "all-MiniLM-L6-v2",
        )
    }

    #[tokio::test]
    async fn register_list_unregister_round_trip() {
        let registry = CollectionRegistry::new(Arc::new(MemoryStore::default()));
        registry.register(sample_metadata("vh:chat:abc")).await.unwrap();
        registry.register(sample_metadata("vh:doc:guide")).await.unwrap();

        assert_eq!(registry.list().await.len(), 2);
        let id = CollectionId::parse("vh:chat:abc").unwrap();
        assert!(registry.is_enabled(&id).await);

        registry.unregister(&id).await.unwrap();
        assert_eq!(registry.list().await.len(), 1);
        assert!(!registry.is_enabled(&id).await);
    }

    #[tokio::test]
    async fn persisted_state_reloads() {
        let store = Arc::new(MemoryStore::default());
        {
            let registry = CollectionRegistry::new(Arc::clone(&store) as Arc<dyn SettingsStore>);
            registry.register(sample_metadata("vh:chat:abc")).await.unwrap();
        }

        let reloaded = CollectionRegistry::new(store);
        reloaded
            .load(BackendKind::Standard, "transformers", "model")
            .await
            .unwrap();
        assert_eq!(reloaded.list().await.len(), 1);
    }

    #[tokio::test]
    async fn legacy_flags_migrate_once() {
        let store = Arc::new(MemoryStore::default());
        store
            .save(
                LEGACY_SETTINGS_KEY,
                serde_json::json!({
                    "vh:chat:abc": true,
                    "vecthare_doc_guide": false,
                    "garbage": true,
                }),
            )
            .await
            .unwrap();

        let registry = CollectionRegistry::new(Arc::clone(&store) as Arc<dyn SettingsStore>);
        registry
            .load(BackendKind::Qdrant, "openai", "text-embedding-3-small")
            .await
            .unwrap();

        let collections = registry.list().await;
        assert_eq!(collections.len(), 2);

        let chat = registry
            .metadata(&CollectionId::parse("vh:chat:abc").unwrap())
            .await
            .unwrap();
        assert!(chat.enabled);
        assert_eq!(chat.backend, BackendKind::Qdrant);

        let doc = registry
            .metadata(&CollectionId::parse("vh:doc:guide").unwrap())
            .await
            .unwrap();
        assert!(!doc.enabled);

        // The migrated shape is now the persisted one
        assert!(
            store
                .load(SETTINGS_KEY)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn set_metadata_patches_and_missing_ids_error() {
        let registry = CollectionRegistry::new(Arc::new(MemoryStore::default()));
        registry.register(sample_metadata("vh:chat:abc")).await.unwrap();

        let id = CollectionId::parse("vh:chat:abc").unwrap();
        registry
            .set_metadata(&id, |m| {
                m.enabled = false;
                m.chunk_count = 17;
            })
            .await
            .unwrap();

        let metadata = registry.metadata(&id).await.unwrap();
        assert!(!metadata.enabled);
        assert_eq!(metadata.chunk_count, 17);

        let missing = CollectionId::parse("vh:chat:missing").unwrap();
        assert!(registry.set_metadata(&missing, |_| {}).await.is_err());
    }

    #[tokio::test]
    async fn enveloped_and_plain_ids_address_the_same_entry() {
        let registry = CollectionRegistry::new(Arc::new(MemoryStore::default()));
        registry.register(sample_metadata("vh:chat:abc")).await.unwrap();

        let enveloped = CollectionId::parse("standard:transformers:vh:chat:abc").unwrap();
        assert!(registry.is_enabled(&enveloped).await);
    }
}
