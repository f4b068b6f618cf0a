//! # VectHare Providers
//!
//! Concrete embedding providers and vector store backends. Every
//! implementation registers itself into the linkme slices defined by
//! `vecthare-application`, so linking this crate is all it takes to make
//! its providers resolvable by name.

pub mod constants;
pub mod embedding;
pub mod utils;
pub mod vector_store;
