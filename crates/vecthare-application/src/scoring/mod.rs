//! Sparse scoring
//!
//! The BM25+ keyword leg of hybrid retrieval: Porter stemming,
//! tokenization, document indexing, and scoring.

mod bm25;
mod porter;
mod tokenize;

pub use bm25::{Bm25Document, Bm25Params, Bm25Scorer, apply_bm25_scoring};
pub use porter::PorterStemmer;
pub use tokenize::{TokenizerOptions, tokenize, tokenize_simple};
