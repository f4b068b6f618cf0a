//! Source Artifacts
//!
//! The host-side objects the chunker consumes: chat messages, documents,
//! and lorebook entries.

use serde::{Deserialize, Serialize};

/// A single message of the host chat log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Ordinal within the chat (the "message id" used for temporal ages)
    pub index: i64,
    /// Speaker name
    pub name: String,
    /// Whether the user authored the message
    #[serde(default)]
    pub is_user: bool,
    /// Message body
    pub text: String,
}

impl ChatMessage {
    /// Convenience constructor
    pub fn new<N: Into<String>, T: Into<String>>(index: i64, name: N, text: T) -> Self {
        Self {
            index,
            name: name.into(),
            is_user: false,
            text: text.into(),
        }
    }
}

/// A user-curated knowledge document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Opaque document identifier
    pub id: String,
    /// Document title
    #[serde(default)]
    pub name: String,
    /// Document body
    pub text: String,
}

/// A world-info / lorebook entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LorebookEntry {
    /// Entry UID within its book
    pub uid: String,
    /// Primary trigger keys
    pub key: Vec<String>,
    /// Secondary trigger keys
    pub keysecondary: Vec<String>,
    /// Entry content
    pub content: String,
    /// Author comment / entry title
    pub comment: String,
}
