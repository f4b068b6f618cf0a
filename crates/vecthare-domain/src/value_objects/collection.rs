//! Collection Addressing
//!
//! Logical collections are addressed by the canonical `vh:{type}:{sourceId}`
//! scheme. The legacy `vecthare_{type}_{sourceId}` form is still parsed, and
//! a registry-key envelope `{backend}:{provider}:{id}` is stripped before any
//! backend sees the ID.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Physical collection shared by all tenants in qdrant multitenancy mode
pub const MULTITENANCY_COLLECTION: &str = "vecthare_multitenancy";

/// Physical collection shared by all tenants on the milvus backend
pub const SHARED_MAIN_COLLECTION: &str = "vecthare_main";

/// Embedding source names recognized when stripping a registry-key envelope
const KNOWN_EMBEDDING_SOURCES: &[&str] = &[
    "transformers",
    "openai",
    "togetherai",
    "mistral",
    "electronhub",
    "openrouter",
    "cohere",
    "ollama",
    "llamacpp",
    "vllm",
    "bananabread",
    "koboldcpp",
    "makersuite",
    "vertexai",
    "nomicai",
    "extras",
];

/// Closed set of vector store backends
///
/// `vectra` is an accepted alias of [`BackendKind::Standard`]; the alias
/// collapses during name normalization so the rest of the system only ever
/// sees the four canonical variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local file-backed store reached through the host's native vector API
    Standard,
    /// Columnar embedded store reached through the host plugin
    LanceDb,
    /// Remote Qdrant server
    Qdrant,
    /// Remote Milvus server
    Milvus,
}

impl BackendKind {
    /// Normalize a backend name, collapsing aliases
    pub fn normalize(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "vectra" => Ok(Self::Standard),
            "lancedb" => Ok(Self::LanceDb),
            "qdrant" => Ok(Self::Qdrant),
            "milvus" => Ok(Self::Milvus),
            other => Err(Error::config(format!("Unknown vector backend '{other}'"))),
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::LanceDb => "lancedb",
            Self::Qdrant => "qdrant",
            Self::Milvus => "milvus",
        }
    }

    /// Whether `name` (including aliases) denotes a known backend
    fn is_backend_name(name: &str) -> bool {
        Self::normalize(name).is_ok()
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

/// Value Object: Logical Collection ID
///
/// ## Business Rules
///
/// - canonical form is `vh:{type}:{sourceId}`
/// - `sourceId` is opaque and may itself contain colons
/// - the legacy `vecthare_{type}_{sourceId}` form parses to the same ID
/// - a registry-key envelope `{backend}:{provider}:{id}` is stripped on parse,
///   so enveloped and plain forms resolve to the same logical collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionId {
    kind: String,
    source_id: String,
}

impl CollectionId {
    /// Build an ID from its parts
    pub fn new<K: Into<String>, S: Into<String>>(kind: K, source_id: S) -> Self {
        Self {
            kind: kind.into(),
            source_id: source_id.into(),
        }
    }

    /// Parse any accepted form of a collection ID
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::invalid_argument("Empty collection ID"));
        }

        if let Some(rest) = raw.strip_prefix("vh:") {
            return Self::parse_canonical(rest, raw);
        }

        if let Some(rest) = raw.strip_prefix("vecthare_") {
            // Skip the physical names of shared collections; they are not logical IDs
            if raw != MULTITENANCY_COLLECTION && raw != SHARED_MAIN_COLLECTION {
                return Self::parse_legacy(rest, raw);
            }
        }

        // Registry-key envelope: backend:provider:id
        let mut parts = raw.splitn(3, ':');
        if let (Some(backend), Some(provider), Some(inner)) =
            (parts.next(), parts.next(), parts.next())
        {
            if BackendKind::is_backend_name(backend)
                && KNOWN_EMBEDDING_SOURCES.contains(&provider.to_ascii_lowercase().as_str())
            {
                return Self::parse(inner);
            }
        }

        Err(Error::invalid_argument(format!(
            "Unrecognized collection ID '{raw}'"
        )))
    }

    fn parse_canonical(rest: &str, raw: &str) -> Result<Self> {
        let mut parts = rest.splitn(2, ':');
        match (parts.next(), parts.next()) {
            (Some(kind), Some(source_id)) if !kind.is_empty() && !source_id.is_empty() => {
                Ok(Self::new(kind, source_id))
            }
            _ => Err(Error::invalid_argument(format!(
                "Malformed collection ID '{raw}'"
            ))),
        }
    }

    fn parse_legacy(rest: &str, raw: &str) -> Result<Self> {
        let mut parts = rest.splitn(2, '_');
        match (parts.next(), parts.next()) {
            (Some(kind), Some(source_id)) if !kind.is_empty() && !source_id.is_empty() => {
                Ok(Self::new(kind, source_id))
            }
            _ => Err(Error::invalid_argument(format!(
                "Malformed legacy collection ID '{raw}'"
            ))),
        }
    }

    /// Collection type (`chat`, `doc`, `lorebook`, `test`, ...)
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Opaque source identifier
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Whether this is a chat-history collection
    pub fn is_chat(&self) -> bool {
        self.kind == "chat"
    }

    /// Legacy flat form, also used as the physical collection name by
    /// backends that keep one collection per logical ID
    pub fn legacy_string(&self) -> String {
        format!(
            "vecthare_{}_{}",
            self.kind,
            self.source_id.replace(':', "_")
        )
    }

    /// Registry-key envelope form
    pub fn registry_key(&self, backend: BackendKind, provider: &str) -> String {
        format!("{backend}:{provider}:{self}")
    }
}

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vh:{}:{}", self.kind, self.source_id)
    }
}

impl std::str::FromStr for CollectionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for CollectionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CollectionId {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trip() {
        let id = CollectionId::parse("vh:chat:abc").unwrap();
        assert_eq!(id.kind(), "chat");
        assert_eq!(id.source_id(), "abc");
        assert_eq!(id.to_string(), "vh:chat:abc");
    }

    #[test]
    fn source_id_may_contain_colons() {
        let id = CollectionId::parse("vh:doc:file:with:colons").unwrap();
        assert_eq!(id.source_id(), "file:with:colons");
    }

    #[test]
    fn legacy_form_is_accepted() {
        let id = CollectionId::parse("vecthare_lorebook_my_world").unwrap();
        assert_eq!(id.kind(), "lorebook");
        assert_eq!(id.source_id(), "my_world");
        assert_eq!(id.to_string(), "vh:lorebook:my_world");
    }

    #[test]
    fn registry_key_envelope_is_stripped() {
        let plain = CollectionId::parse("vh:chat:abc").unwrap();
        let enveloped = CollectionId::parse("qdrant:openai:vh:chat:abc").unwrap();
        assert_eq!(plain, enveloped);
        let aliased = CollectionId::parse("vectra:transformers:vecthare_chat_abc").unwrap();
        assert_eq!(plain, aliased);
    }

    #[test]
    fn envelope_round_trips_through_registry_key() {
        let id = CollectionId::parse("vh:chat:abc").unwrap();
        let key = id.registry_key(BackendKind::Qdrant, "openai");
        assert_eq!(key, "qdrant:openai:vh:chat:abc");
        assert_eq!(CollectionId::parse(&key).unwrap(), id);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(CollectionId::parse("").is_err());
        assert!(CollectionId::parse("vh:chat").is_err());
        assert!(CollectionId::parse("not-a-collection").is_err());
        assert!(CollectionId::parse("vecthare_chat").is_err());
    }

    #[test]
    fn backend_alias_normalizes() {
        assert_eq!(
            BackendKind::normalize("vectra").unwrap(),
            BackendKind::Standard
        );
        assert_eq!(
            BackendKind::normalize("QDRANT").unwrap(),
            BackendKind::Qdrant
        );
        assert!(BackendKind::normalize("pinecone").is_err());
    }
}
