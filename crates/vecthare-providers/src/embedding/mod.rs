//! Embedding providers
//!
//! One module per embedding source. Each registers itself into
//! `EMBEDDING_PROVIDERS`; the gateway resolves them by source name.

pub mod helpers;

#[cfg(feature = "embedding-http")]
mod bananabread;
#[cfg(feature = "embedding-http")]
mod cohere;
#[cfg(feature = "embedding-fastembed")]
mod fastembed;
#[cfg(feature = "embedding-http")]
mod extras;
#[cfg(feature = "embedding-http")]
mod google;
#[cfg(feature = "embedding-http")]
mod koboldcpp;
#[cfg(feature = "embedding-http")]
mod llamacpp;
#[cfg(feature = "embedding-http")]
mod nomicai;
#[cfg(feature = "embedding-http")]
mod ollama;
#[cfg(feature = "embedding-http")]
mod openai;
#[cfg(feature = "embedding-http")]
mod vllm;

#[cfg(feature = "embedding-http")]
pub use bananabread::BananaBreadEmbeddingProvider;
#[cfg(feature = "embedding-http")]
pub use cohere::CohereEmbeddingProvider;
#[cfg(feature = "embedding-fastembed")]
pub use fastembed::FastEmbedProvider;
#[cfg(feature = "embedding-http")]
pub use extras::ExtrasEmbeddingProvider;
#[cfg(feature = "embedding-http")]
pub use google::GoogleEmbeddingProvider;
#[cfg(feature = "embedding-http")]
pub use koboldcpp::KoboldCppEmbeddingProvider;
#[cfg(feature = "embedding-http")]
pub use llamacpp::LlamaCppEmbeddingProvider;
#[cfg(feature = "embedding-http")]
pub use nomicai::NomicAiEmbeddingProvider;
#[cfg(feature = "embedding-http")]
pub use ollama::OllamaEmbeddingProvider;
#[cfg(feature = "embedding-http")]
pub use openai::OpenAiCompatibleProvider;
#[cfg(feature = "embedding-http")]
pub use vllm::VllmEmbeddingProvider;
