//! Backend registry behaviour: caching, TTL re-verification, LRU eviction,
//! and health invalidation, exercised through mock backends registered into
//! the linkme slice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use vecthare_application::backends::{BackendRegistry, RegistryConfig};
use vecthare_application::registry::{VECTOR_BACKENDS, VectorBackendConfig, VectorBackendEntry};
use vecthare_domain::error::Result;
use vecthare_domain::ports::VectorBackend;
use vecthare_domain::value_objects::{
    BackendKind, Chunk, CollectionId, CollectionQueryResult, QueryRequest,
};

/// Serializes the tests in this file; they share the mock counters below
static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

static STANDARD_BUILDS: AtomicUsize = AtomicUsize::new(0);
static STANDARD_HEALTH_CHECKS: AtomicUsize = AtomicUsize::new(0);
static STANDARD_HEALTHY: AtomicBool = AtomicBool::new(true);
static QDRANT_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct MockBackend {
    name: &'static str,
}

#[async_trait]
impl VectorBackend for MockBackend {
    async fn health_check(&self) -> Result<bool> {
        if self.name == "standard" {
            STANDARD_HEALTH_CHECKS.fetch_add(1, Ordering::SeqCst);
            return Ok(STANDARD_HEALTHY.load(Ordering::SeqCst));
        }
        Ok(true)
    }

    async fn saved_hashes(&self, _collection: &CollectionId) -> Result<Vec<u32>> {
        Ok(Vec::new())
    }

    async fn insert_chunks(&self, _collection: &CollectionId, _chunks: &[Chunk]) -> Result<()> {
        Ok(())
    }

    async fn delete_hashes(&self, _collection: &CollectionId, _hashes: &[u32]) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _collection: &CollectionId,
        _request: &QueryRequest,
    ) -> Result<CollectionQueryResult> {
        Ok(CollectionQueryResult::default())
    }

    async fn purge(&self, _collection: &CollectionId) -> Result<()> {
        Ok(())
    }

    async fn purge_all(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        self.name
    }
}

#[linkme::distributed_slice(VECTOR_BACKENDS)]
static MOCK_STANDARD: VectorBackendEntry = VectorBackendEntry {
    kind: BackendKind::Standard,
    description: "mock standard backend",
    factory: |_config| {
        STANDARD_BUILDS.fetch_add(1, Ordering::SeqCst);
        Ok(std::sync::Arc::new(MockBackend { name: "standard" }))
    },
};

#[linkme::distributed_slice(VECTOR_BACKENDS)]
static MOCK_QDRANT: VectorBackendEntry = VectorBackendEntry {
    kind: BackendKind::Qdrant,
    description: "mock qdrant backend",
    factory: |_config| {
        QDRANT_BUILDS.fetch_add(1, Ordering::SeqCst);
        Ok(std::sync::Arc::new(MockBackend { name: "qdrant" }))
    },
};

fn registry(capacity: usize, ttl: Duration) -> BackendRegistry {
    BackendRegistry::new(RegistryConfig {
        capacity,
        health_ttl: ttl,
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_instance_is_reused_within_ttl() {
    let _guard = test_guard();
    STANDARD_HEALTHY.store(true, Ordering::SeqCst);
    let registry = registry(5, Duration::from_secs(60));
    let config = VectorBackendConfig::default();

    let builds_before = STANDARD_BUILDS.load(Ordering::SeqCst);
    let first = registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    assert!(first.is_some());
    let second = registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    assert!(second.is_some());

    // One construction serves both acquisitions
    assert_eq!(STANDARD_BUILDS.load(Ordering::SeqCst), builds_before + 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_ttl_triggers_reverification() {
    let _guard = test_guard();
    STANDARD_HEALTHY.store(true, Ordering::SeqCst);
    let registry = registry(5, Duration::ZERO);
    let config = VectorBackendConfig::default();

    registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    let checks_after_first = STANDARD_HEALTH_CHECKS.load(Ordering::SeqCst);

    registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    // A zero TTL forces a fresh health check on the second acquire
    assert!(STANDARD_HEALTH_CHECKS.load(Ordering::SeqCst) > checks_after_first);
}

#[tokio::test(flavor = "multi_thread")]
async fn unhealthy_flag_forces_rebuild() {
    let _guard = test_guard();
    STANDARD_HEALTHY.store(true, Ordering::SeqCst);
    let registry = registry(5, Duration::from_secs(60));
    let config = VectorBackendConfig::default();

    registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    let builds = STANDARD_BUILDS.load(Ordering::SeqCst);

    registry.mark_unhealthy(BackendKind::Standard).await;
    registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    assert_eq!(STANDARD_BUILDS.load(Ordering::SeqCst), builds + 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_health_check_returns_none_or_error() {
    let _guard = test_guard();
    STANDARD_HEALTHY.store(false, Ordering::SeqCst);
    let registry = registry(5, Duration::from_secs(60));
    let config = VectorBackendConfig::default();

    let soft = registry
        .acquire(BackendKind::Standard, &config, false)
        .await
        .unwrap();
    assert!(soft.is_none());

    let hard = registry.acquire(BackendKind::Standard, &config, true).await;
    assert!(hard.is_err());

    STANDARD_HEALTHY.store(true, Ordering::SeqCst);
}

#[tokio::test(flavor = "multi_thread")]
async fn lru_eviction_respects_capacity() {
    let _guard = test_guard();
    STANDARD_HEALTHY.store(true, Ordering::SeqCst);
    let registry = registry(1, Duration::from_secs(60));
    let config = VectorBackendConfig::default();

    registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    assert_eq!(registry.cached_kinds().await, vec![BackendKind::Standard]);

    // Capacity 1: acquiring a second kind evicts the first
    registry
        .acquire(BackendKind::Qdrant, &config, true)
        .await
        .unwrap();
    assert_eq!(registry.cached_kinds().await, vec![BackendKind::Qdrant]);

    let builds = STANDARD_BUILDS.load(Ordering::SeqCst);
    registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    assert_eq!(STANDARD_BUILDS.load(Ordering::SeqCst), builds + 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_snapshot_tracks_operations() {
    let _guard = test_guard();
    STANDARD_HEALTHY.store(true, Ordering::SeqCst);
    let registry = registry(5, Duration::from_secs(60));
    let config = VectorBackendConfig::default();

    registry
        .acquire(BackendKind::Standard, &config, true)
        .await
        .unwrap();
    registry
        .metrics()
        .record_query(BackendKind::Standard, Duration::from_millis(3));
    registry.metrics().record_insert(BackendKind::Standard);
    registry
        .metrics()
        .record_error(BackendKind::Standard, "simulated failure");

    let snapshot = registry.snapshot();
    assert!(snapshot.total_queries >= 1);
    assert!(snapshot.total_inserts >= 1);
    assert!(snapshot.total_errors >= 1);

    let standard: &HashMap<String, _> = &snapshot.backends;
    let entry = &standard["standard"];
    assert!(entry.queries >= 1);
    assert!(entry.health_checks_passed >= 1);
    assert_eq!(
        entry.last_error.as_ref().unwrap().message,
        "simulated failure"
    );
}
