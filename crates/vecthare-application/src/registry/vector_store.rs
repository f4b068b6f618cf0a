//! Vector Backend Registry
//!
//! Auto-registration system for vector store adapters, keyed by the
//! normalized [`BackendKind`]. The `vectra` alias collapses during
//! normalization, so adapters only register canonical names.

use std::sync::Arc;
use std::time::Duration;

use vecthare_domain::ports::{EmbeddingProvider, VectorBackend};
use vecthare_domain::value_objects::BackendKind;

/// Qdrant transport settings
#[derive(Debug, Clone, Default)]
pub struct QdrantSettings {
    /// Full URL; overrides host/port when set
    pub url: Option<String>,
    /// Host name when no full URL is given
    pub host: Option<String>,
    /// Port when no full URL is given
    pub port: Option<u16>,
    /// API key for Qdrant Cloud or secured instances
    pub api_key: Option<String>,
    /// Use https when assembling from host/port
    pub use_cloud: bool,
    /// Single shared collection with per-point tenant filters
    pub multitenancy: bool,
}

/// Milvus transport settings
#[derive(Debug, Clone, Default)]
pub struct MilvusSettings {
    /// Full address; overrides host/port when set
    pub address: Option<String>,
    /// Host name when no address is given
    pub host: Option<String>,
    /// Port when no address is given
    pub port: Option<u16>,
    /// Username for password auth
    pub username: Option<String>,
    /// Password for password auth
    pub password: Option<String>,
    /// Token auth, preferred over username/password when set
    pub token: Option<String>,
    /// Dimension override; skips probe discovery when set
    pub dimensions: Option<usize>,
}

/// Configuration for vector backend creation.
///
/// Contains the transport settings of every adapter; each uses what it
/// needs and ignores the rest. The embedder handle is how adapters that
/// must embed client-side (qdrant, milvus) get their vectors - the
/// registry passes it in at construction so no adapter ever reaches back
/// into global state.
#[derive(Clone, Default)]
pub struct VectorBackendConfig {
    /// Host application API base URL (standard and lancedb adapters)
    pub host_url: Option<String>,
    /// Host plugin API base URL; probed when absent
    pub plugin_url: Option<String>,
    /// Embedding source name, for backends that embed server-side
    pub embedding_source: Option<String>,
    /// Embedding model name, recorded alongside server-side embeds
    pub embedding_model: Option<String>,
    /// Qdrant settings
    pub qdrant: QdrantSettings,
    /// Milvus settings
    pub milvus: MilvusSettings,
    /// Embedder for client-side vector generation and dimension probes
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    /// Per-request timeout
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for VectorBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorBackendConfig")
            .field("host_url", &self.host_url)
            .field("plugin_url", &self.plugin_url)
            .field("qdrant", &self.qdrant)
            .field("milvus", &self.milvus)
            .field("embedder", &self.embedder.as_ref().map(|e| e.provider_name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Registry entry for vector backends
pub struct VectorBackendEntry {
    /// Canonical backend kind
    pub kind: BackendKind,
    /// Human-readable description
    pub description: &'static str,
    /// Factory function to create the adapter. Construction is cheap and
    /// synchronous; transport is established later in
    /// `VectorBackend::initialize`.
    pub factory: fn(&VectorBackendConfig) -> std::result::Result<Arc<dyn VectorBackend>, String>,
}

/// Distributed slice collecting backend entries at link time
#[linkme::distributed_slice]
pub static VECTOR_BACKENDS: [VectorBackendEntry] = [..];

/// Resolve a vector backend by kind.
pub fn resolve_vector_backend(
    kind: BackendKind,
    config: &VectorBackendConfig,
) -> std::result::Result<Arc<dyn VectorBackend>, String> {
    for entry in VECTOR_BACKENDS {
        if entry.kind == kind {
            return (entry.factory)(config);
        }
    }

    let available: Vec<&str> = VECTOR_BACKENDS.iter().map(|e| e.kind.as_str()).collect();
    Err(format!(
        "No adapter registered for backend '{kind}'. Available backends: {available:?}"
    ))
}

/// List all registered vector backends as (name, description) pairs
pub fn list_vector_backends() -> Vec<(&'static str, &'static str)> {
    VECTOR_BACKENDS
        .iter()
        .map(|e| (e.kind.as_str(), e.description))
        .collect()
}
