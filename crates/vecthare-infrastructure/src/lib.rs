//! # VectHare Infrastructure
//!
//! The outer shell: configuration loading, logging initialization, the
//! file-backed settings store the collection registry persists through,
//! and the generation-time interceptor glue the host invokes.

pub mod config;
pub mod interceptor;
pub mod logging;
pub mod settings_store;

pub use config::{ConfigLoader, VecthareSettings};
pub use interceptor::RetrievalInterceptor;
pub use settings_store::FileSettingsStore;
