//! Backend registry
//!
//! Caches adapter instances per backend kind, re-verifies health on a TTL,
//! evicts by LRU when the cache is full, and tracks per-backend metrics.
//! An adapter moves through `uninitialized -> initializing -> healthy`,
//! drops to `unhealthy` on an operation error (cached health invalidated),
//! and leaves the cache on LRU eviction.
//!
//! The registry is a plain owned value; it is shared by `Arc`, never by a
//! process-wide singleton.

mod metrics;

pub use metrics::{BackendMetricsSnapshot, LastError, MetricsSnapshot, RegistryMetrics};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::VectorBackend;
use vecthare_domain::value_objects::BackendKind;

use crate::registry::{VectorBackendConfig, resolve_vector_backend};

/// Registry tuning
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Maximum cached adapter instances
    pub capacity: usize,
    /// How long a passed health check stays trusted
    pub health_ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            health_ttl: Duration::from_secs(60),
        }
    }
}

struct CacheEntry {
    backend: Arc<dyn VectorBackend>,
    healthy: bool,
    last_access: Instant,
    health_verified_at: Option<Instant>,
}

/// Cached, health-checked vector backend instances
pub struct BackendRegistry {
    config: RegistryConfig,
    entries: Mutex<HashMap<BackendKind, CacheEntry>>,
    acquire_locks: DashMap<BackendKind, Arc<Mutex<()>>>,
    metrics: Arc<RegistryMetrics>,
}

impl BackendRegistry {
    /// Create a registry with the given tuning
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            acquire_locks: DashMap::new(),
            metrics: Arc::new(RegistryMetrics::new()),
        }
    }

    /// Metrics recorder shared with callers
    pub fn metrics(&self) -> Arc<RegistryMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Acquire a healthy adapter for `kind`.
    ///
    /// Serialized per backend kind so concurrent callers never
    /// double-initialize. A cached healthy instance inside its TTL returns
    /// immediately; an expired one is re-verified first. On verification or
    /// construction failure the error is recorded, and the call either
    /// returns it (`throw_on_fail`) or yields `None`.
    pub async fn acquire(
        &self,
        kind: BackendKind,
        config: &VectorBackendConfig,
        throw_on_fail: bool,
    ) -> Result<Option<Arc<dyn VectorBackend>>> {
        let lock = {
            let entry = self
                .acquire_locks
                .entry(kind)
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };
        let _guard = lock.lock().await;

        // Fast path: cached, healthy, TTL fresh
        if let Some(backend) = self.cached_if_fresh(kind).await {
            return Ok(Some(backend));
        }

        // Stale path: cached and healthy but TTL expired; re-verify
        if let Some(backend) = self.stale_backend(kind).await {
            match backend.health_check().await {
                Ok(true) => {
                    self.metrics.record_health_check(kind, true);
                    self.refresh(kind).await;
                    return Ok(Some(backend));
                }
                Ok(false) => {
                    self.metrics.record_health_check(kind, false);
                    tracing::warn!("Cached {kind} backend failed re-verification, rebuilding");
                    self.remove(kind).await;
                }
                Err(e) => {
                    self.metrics.record_health_check(kind, false);
                    self.metrics.record_error(kind, &e.to_string());
                    tracing::warn!("Cached {kind} backend health check errored: {e}");
                    self.remove(kind).await;
                }
            }
        }

        // Make room before constructing a new instance
        self.evict_to_capacity().await;

        match self.build(kind, config).await {
            Ok(backend) => {
                self.metrics.record_health_check(kind, true);
                let mut entries = self.entries.lock().await;
                entries.insert(
                    kind,
                    CacheEntry {
                        backend: Arc::clone(&backend),
                        healthy: true,
                        last_access: Instant::now(),
                        health_verified_at: Some(Instant::now()),
                    },
                );
                Ok(Some(backend))
            }
            Err(e) => {
                self.metrics.record_health_check(kind, false);
                self.metrics.record_error(kind, &e.to_string());
                tracing::error!("Failed to acquire {kind} backend: {e}");
                if throw_on_fail { Err(e) } else { Ok(None) }
            }
        }
    }

    /// Invalidate cached health after an operation error.
    ///
    /// The instance stays cached; the next `acquire` re-verifies it.
    pub async fn mark_unhealthy(&self, kind: BackendKind) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&kind) {
            entry.healthy = false;
            entry.health_verified_at = None;
        }
    }

    /// Drop a cached instance entirely
    pub async fn remove(&self, kind: BackendKind) {
        self.entries.lock().await.remove(&kind);
    }

    /// Kinds currently cached (for diagnostics)
    pub async fn cached_kinds(&self) -> Vec<BackendKind> {
        self.entries.lock().await.keys().copied().collect()
    }

    /// Current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn cached_if_fresh(&self, kind: BackendKind) -> Option<Arc<dyn VectorBackend>> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&kind) {
            Some(entry) if entry.healthy => {
                let fresh = entry
                    .health_verified_at
                    .is_some_and(|t| t.elapsed() <= self.config.health_ttl);
                if fresh {
                    entry.last_access = Instant::now();
                    Some(Arc::clone(&entry.backend))
                } else {
                    None
                }
            }
            Some(_) => {
                // Unhealthy instances are rebuilt from scratch
                entries.remove(&kind);
                None
            }
            None => None,
        }
    }

    async fn stale_backend(&self, kind: BackendKind) -> Option<Arc<dyn VectorBackend>> {
        let entries = self.entries.lock().await;
        entries
            .get(&kind)
            .filter(|e| e.healthy)
            .map(|e| Arc::clone(&e.backend))
    }

    async fn refresh(&self, kind: BackendKind) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&kind) {
            entry.last_access = Instant::now();
            entry.health_verified_at = Some(Instant::now());
        }
    }

    /// Evict least-recently-used entries until one slot is free
    async fn evict_to_capacity(&self) {
        let mut entries = self.entries.lock().await;
        while entries.len() >= self.config.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| *k);
            match oldest {
                Some(kind) => {
                    tracing::debug!("Evicting least-recently-used backend {kind}");
                    entries.remove(&kind);
                }
                None => break,
            }
        }
    }

    async fn build(
        &self,
        kind: BackendKind,
        config: &VectorBackendConfig,
    ) -> Result<Arc<dyn VectorBackend>> {
        let backend = resolve_vector_backend(kind, config).map_err(Error::config)?;
        backend.initialize().await?;
        match backend.health_check().await {
            Ok(true) => Ok(backend),
            Ok(false) => Err(Error::transient_backend(format!(
                "Backend '{kind}' failed its initial health check"
            ))),
            Err(e) => Err(e),
        }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
