//! Ports (trait boundaries)
//!
//! Contracts implemented by the providers crate (embedding, vector stores)
//! and by the infrastructure crate (host collaborators).

mod embedding;
mod host;
mod vector_store;

pub use embedding::{BatchLimit, EmbeddingProvider};
pub use host::{ActiveInjection, GenerationType, PromptInjection, PromptInjector, SettingsStore};
pub use vector_store::VectorBackend;
