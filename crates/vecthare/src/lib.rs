//! # VectHare
//!
//! A retrieval-augmented generation substrate for conversational hosts:
//! chat history, documents, and lorebooks become embedded vector
//! collections across interchangeable backends, and the most relevant
//! fragments come back at generation time.
//!
//! This crate is the public facade. Linking it pulls in the provider
//! registrations, so backends and embedding sources resolve by name.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vecthare::prelude::*;
//!
//! let settings = ConfigLoader::new().load()?;
//! let backends = Arc::new(BackendRegistry::default());
//! let store = Arc::new(FileSettingsStore::open("vecthare-settings.json").await?);
//! let collections = Arc::new(CollectionRegistry::new(store));
//! let orchestrator = Arc::new(QueryOrchestrator::new(backends, collections));
//! ```
//!
//! ## Architecture
//!
//! - `domain` - value objects, collection addressing, error taxonomy, ports
//! - `application` - the retrieval pipeline and its registries
//! - `providers` - embedding sources and vector backends (linkme-registered)
//! - `infrastructure` - configuration, logging, persistence, host glue

pub use vecthare_application as application;
pub use vecthare_domain as domain;
pub use vecthare_infrastructure as infrastructure;
pub use vecthare_providers as providers;

/// Commonly used types, re-exported flat
pub mod prelude {
    pub use vecthare_application::backends::{BackendRegistry, RegistryConfig};
    pub use vecthare_application::chunking::{Chunker, ChunkerConfig, ChunkingStrategy};
    pub use vecthare_application::collections::CollectionRegistry;
    pub use vecthare_application::embedding::EmbeddingGateway;
    pub use vecthare_application::query::{QueryOrchestrator, RetrievalSettings};
    pub use vecthare_application::sync::{ChunkSource, SyncConfig, SyncController};
    pub use vecthare_domain::error::{Error, Result};
    pub use vecthare_domain::value_objects::{
        BackendKind, Chunk, ChunkMetadata, CollectionId, CollectionMetadata, DecaySettings,
    };
    pub use vecthare_infrastructure::config::{ConfigLoader, VecthareSettings};
    pub use vecthare_infrastructure::interceptor::RetrievalInterceptor;
    pub use vecthare_infrastructure::settings_store::FileSettingsStore;
}
