//! Chunk Value Objects
//!
//! The chunk is the atomic unit of storage: a fragment of searchable text
//! addressed by its content hash, with an optional dense vector and an
//! open metadata bag the backends persist alongside it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::hash::string_hash;

/// Value Object: Weighted Keyword
///
/// A keyword extracted from chunk text together with its boost weight.
/// Weights are clamped by the extractor to `[1.0, 3.0]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Keyword {
    /// The keyword text, lowercased
    pub text: String,
    /// Boost weight applied when the keyword matches a query
    pub weight: f32,
}

impl Keyword {
    /// Create a keyword with the given weight
    pub fn new<S: Into<String>>(text: S, weight: f32) -> Self {
        Self {
            text: text.into(),
            weight,
        }
    }
}

/// Value Object: Chunk Metadata
///
/// Open key/value bag carried with every stored chunk. Known fields are
/// typed; anything else round-trips through `extra`. Wire names are
/// camelCase to match the host application's own vector entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkMetadata {
    /// Embedding provider identifier, or `"chat"`/`"doc"`/`"lorebook"` origin tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Host message ordinal the chunk was cut from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    /// Hash of the full source message before chunking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_message_hash: Option<u32>,
    /// Ordinal of this chunk within its source artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    /// Total chunks cut from the source artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    /// Weighted keywords extracted from the chunk text
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<Keyword>,
    /// User-assigned importance multiplier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    /// Per-keyword weight overrides keyed by keyword text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_weights: Option<std::collections::HashMap<String, f32>>,
    /// Keywords the user disabled for boosting
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disabled_keywords: Vec<String>,
    /// Grouping tag linking related chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_group: Option<String>,
    /// Raw activation conditions carried from the source entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
    /// Optional condensed form of the chunk text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Whether this chunk is a summary standing in for a longer original
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_summary_chunk: bool,
    /// Hash of the chunk this summary condenses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<u32>,
    /// Logical collection ID; set on every point in shared-collection backends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Unrecognized fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkMetadata {
    /// Metadata tagged with an origin source (e.g. `"chat"`)
    pub fn with_source<S: Into<String>>(source: S) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// Whether the chunk originates from chat history (temporal weighting applies)
    pub fn is_chat_source(&self) -> bool {
        self.source.as_deref() == Some("chat")
    }

    /// Effective weight for a keyword, honouring user overrides and disables
    pub fn keyword_weight(&self, keyword: &str) -> Option<f32> {
        if self.disabled_keywords.iter().any(|k| k == keyword) {
            return None;
        }
        if let Some(overrides) = &self.custom_weights {
            if let Some(w) = overrides.get(keyword) {
                return Some(*w);
            }
        }
        self.keywords
            .iter()
            .find(|k| k.text == keyword)
            .map(|k| k.weight)
    }
}

/// Entity: Stored Chunk
///
/// ## Business Rules
///
/// - `hash` is always `string_hash(text)` over the canonical text, including
///   any embedded keyword annotation
/// - at most one chunk per `(collection, hash)` pair exists in any backend
/// - `vector` is `None` when the backend embeds server-side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// 32-bit fingerprint of `text`
    pub hash: u32,
    /// The searchable body
    pub text: String,
    /// Ordinal within the source artifact
    pub index: usize,
    /// Dense embedding; absent when the backend generates it server-side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Open metadata bag
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a chunk from text, computing its hash
    pub fn new<S: Into<String>>(text: S, index: usize, metadata: ChunkMetadata) -> Self {
        let text = text.into();
        Self {
            hash: string_hash(&text),
            text,
            index,
            vector: None,
            metadata,
        }
    }

    /// Attach a dense vector
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Searchable text with keywords appended, for backends that cannot carry
    /// structured keyword metadata: `"text [KEYWORDS: k1 k2 k3]"`.
    ///
    /// The returned string is what gets hashed and stored on that path, so the
    /// chunk built from it carries a different hash than the bare text.
    pub fn text_with_embedded_keywords(&self) -> String {
        if self.metadata.keywords.is_empty() {
            return self.text.clone();
        }
        let joined = self
            .metadata
            .keywords
            .iter()
            .map(|k| k.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} [KEYWORDS: {}]", self.text, joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_matches_text() {
        let chunk = Chunk::new("some text", 0, ChunkMetadata::default());
        assert_eq!(chunk.hash, string_hash("some text"));
    }

    #[test]
    fn embedded_keyword_form() {
        let mut meta = ChunkMetadata::default();
        meta.keywords = vec![Keyword::new("fox", 1.5), Keyword::new("dog", 1.2)];
        let chunk = Chunk::new("The fox chased the dog", 0, meta);
        assert_eq!(
            chunk.text_with_embedded_keywords(),
            "The fox chased the dog [KEYWORDS: fox dog]"
        );
    }

    #[test]
    fn keyword_weight_honours_overrides_and_disables() {
        let mut meta = ChunkMetadata::default();
        meta.keywords = vec![Keyword::new("fox", 1.5), Keyword::new("dog", 1.2)];
        meta.custom_weights = Some([("fox".to_string(), 2.5)].into_iter().collect());
        meta.disabled_keywords = vec!["dog".to_string()];
        assert_eq!(meta.keyword_weight("fox"), Some(2.5));
        assert_eq!(meta.keyword_weight("dog"), None);
        assert_eq!(meta.keyword_weight("cat"), None);
    }

    #[test]
    fn metadata_serializes_camel_case_and_round_trips() {
        let mut meta = ChunkMetadata::with_source("chat");
        meta.message_id = Some(42);
        meta.is_summary_chunk = true;
        meta.parent_hash = Some(7);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["messageId"], 42);
        assert_eq!(json["isSummaryChunk"], true);
        assert_eq!(json["parentHash"], 7);
        let back: ChunkMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
