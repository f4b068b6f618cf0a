//! Embedding gateway

mod gateway;

pub use gateway::{EmbeddingGateway, normalize_single_flattened};
