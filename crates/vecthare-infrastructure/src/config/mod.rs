//! Configuration
//!
//! The canonical settings surface and its figment-based loader.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{LoggingSettings, VecthareSettings};
