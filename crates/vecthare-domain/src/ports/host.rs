//! Host Application Ports
//!
//! The host chat application is an external collaborator: it persists
//! settings, owns the prompt composer, and invokes the retrieval
//! interceptor on generation. These ports describe the slices of it the
//! substrate touches.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Why the host is generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    /// Ordinary turn
    #[default]
    Normal,
    /// Continue the last message
    Continue,
    /// Write as the user
    Impersonate,
    /// Alternate take on the last message
    Swipe,
    /// Re-roll the last message
    Regenerate,
    /// Background generation the user never sees
    Quiet,
}

/// An injection already active in the host's prompt state.
///
/// Retrieval deduplicates against these by UID and by normalized content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveInjection {
    /// Host-side UID of the injected entry
    pub uid: String,
    /// Injected text
    pub content: String,
}

/// A prompt injection handed to the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptInjection {
    /// Stable identifier for replacement on re-injection
    pub id: String,
    /// Formatted retrieval payload
    pub content: String,
    /// Host position slot
    pub position: i32,
    /// Insertion depth in messages
    pub depth: i32,
    /// Whether world-info scanning may see the injected text
    pub scan: bool,
}

/// Host settings persistence.
///
/// Writes are expected to be debounced by the implementation; the registry
/// saves eagerly and often.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load a value by key; `None` when never written
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Persist a value under a key
    async fn save(&self, key: &str, value: Value) -> Result<()>;
}

/// The host's prompt-injection API
#[async_trait]
pub trait PromptInjector: Send + Sync {
    /// Injections currently active in the prompt state
    async fn active_injections(&self) -> Result<Vec<ActiveInjection>>;

    /// Set (or replace) an injection
    async fn inject(&self, injection: PromptInjection) -> Result<()>;

    /// Remove a previously set injection
    async fn clear(&self, id: &str) -> Result<()>;
}
