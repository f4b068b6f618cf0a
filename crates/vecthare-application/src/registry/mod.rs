//! Provider registries
//!
//! Auto-registration for embedding providers and vector backends.
//! Implementations register themselves via `linkme` distributed slices and
//! are resolved by name at runtime.

mod embedding;
mod vector_store;

pub use embedding::{
    CohereInputType, EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
    EmbeddingTransport, GoogleApi, list_embedding_providers, resolve_embedding_provider,
};
pub use vector_store::{
    MilvusSettings, QdrantSettings, VECTOR_BACKENDS, VectorBackendConfig, VectorBackendEntry,
    list_vector_backends, resolve_vector_backend,
};
