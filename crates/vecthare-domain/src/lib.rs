//! # VectHare Domain
//!
//! Core business types for the VectHare retrieval substrate: chunks,
//! collection addressing, embeddings, decay settings, the error taxonomy,
//! and the ports implemented by provider and infrastructure crates.
//!
//! This crate is dependency-light by design: serialization, error derivation,
//! and async trait support only. Everything that talks to the network or the
//! filesystem lives behind the ports defined in [`ports`].

pub mod error;
pub mod hash;
pub mod ports;
pub mod similarity;
pub mod value_objects;

pub use error::{Error, Result};
pub use hash::string_hash;
pub use similarity::cosine_similarity;
