//! Domain value objects
//!
//! Immutable types passed between the retrieval pipeline, the backends,
//! and the host application.

mod chat;
mod chunk;
mod collection;
mod decay;
mod embedding;
mod metadata;
mod query;

pub use chat::{ChatMessage, Document, LorebookEntry};
pub use chunk::{Chunk, ChunkMetadata, Keyword};
pub use collection::{BackendKind, CollectionId, MULTITENANCY_COLLECTION, SHARED_MAIN_COLLECTION};
pub use decay::{DecayMode, DecaySettings, DecayType};
pub use embedding::Embedding;
pub use metadata::{ActivationConditions, ActivationMatchMode, CollectionMetadata};
pub use query::{
    CollectionQueryOutcome, CollectionQueryResult, HybridOptions, QueryInput, QueryRequest,
    RetrievedChunk, SceneRange,
};
