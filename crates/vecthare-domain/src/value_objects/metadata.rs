//! Collection Metadata
//!
//! Per-collection configuration owned by the collection registry and
//! persisted through the host's settings store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collection::{BackendKind, CollectionId};
use super::decay::DecaySettings;

/// How activation keywords combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMatchMode {
    /// Any keyword present activates the collection
    #[default]
    Any,
    /// Every keyword must be present
    All,
}

/// Conditions gating whether a collection participates in a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivationConditions {
    /// Keywords searched for in the query context
    pub keywords: Vec<String>,
    /// Any/all combination mode
    pub match_mode: ActivationMatchMode,
    /// Match case-sensitively
    pub case_sensitive: bool,
}

impl ActivationConditions {
    /// Evaluate the conditions against a search context.
    ///
    /// Empty keyword lists always pass.
    pub fn matches(&self, context: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let haystack = if self.case_sensitive {
            context.to_string()
        } else {
            context.to_lowercase()
        };
        let mut hits = self.keywords.iter().map(|k| {
            if self.case_sensitive {
                haystack.contains(k.as_str())
            } else {
                haystack.contains(&k.to_lowercase())
            }
        });
        match self.match_mode {
            ActivationMatchMode::Any => hits.any(|h| h),
            ActivationMatchMode::All => hits.all(|h| h),
        }
    }
}

/// Entity: Collection Metadata
///
/// Tracks the lineage (backend + embedding source + model) a collection was
/// built with, along with retrieval configuration. Lineage is what makes
/// dimension-mismatch detection possible when the user switches models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    /// Canonical collection ID
    pub id: CollectionId,
    /// Backend the vectors live in
    pub backend: BackendKind,
    /// Embedding source the vectors were generated by
    pub source: String,
    /// Embedding model the vectors were generated by
    pub model: String,
    /// Human-readable source name (chat title, document name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// Number of chunks at last sync
    #[serde(default)]
    pub chunk_count: usize,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Scope tag (e.g. "character", "global")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Chunking strategy name the collection was built with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Temporal weighting override for this collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decay: Option<DecaySettings>,
    /// Whether the collection participates in retrieval
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Conditions gating participation per query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_conditions: Option<ActivationConditions>,
    /// Hashes exempt from temporal weighting
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temporally_blind: Vec<u32>,
}

fn default_enabled() -> bool {
    true
}

impl CollectionMetadata {
    /// Fresh metadata for a newly registered collection
    pub fn new(id: CollectionId, backend: BackendKind, source: &str, model: &str) -> Self {
        Self {
            id,
            backend,
            source: source.to_string(),
            model: model.to_string(),
            source_name: None,
            chunk_count: 0,
            created_at: Utc::now(),
            scope: None,
            strategy: None,
            decay: None,
            enabled: true,
            activation_conditions: None,
            temporally_blind: Vec::new(),
        }
    }

    /// Whether the collection should participate in a query over `context`
    pub fn should_activate(&self, context: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.activation_conditions
            .as_ref()
            .is_none_or(|c| c.matches(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> CollectionMetadata {
        CollectionMetadata::new(
            CollectionId::new("chat", "abc"),
            BackendKind::Standard,
            "transformers",
            "all-MiniLM-L6-v2",
        )
    }

    #[test]
    fn disabled_collection_never_activates() {
        let mut m = meta();
        m.enabled = false;
        assert!(!m.should_activate("anything at all"));
    }

    #[test]
    fn activation_conditions_any_and_all() {
        let mut m = meta();
        m.activation_conditions = Some(ActivationConditions {
            keywords: vec!["dragon".into(), "castle".into()],
            match_mode: ActivationMatchMode::Any,
            case_sensitive: false,
        });
        assert!(m.should_activate("The Dragon sleeps"));
        assert!(!m.should_activate("nothing relevant"));

        m.activation_conditions = Some(ActivationConditions {
            keywords: vec!["dragon".into(), "castle".into()],
            match_mode: ActivationMatchMode::All,
            case_sensitive: false,
        });
        assert!(!m.should_activate("The Dragon sleeps"));
        assert!(m.should_activate("the dragon guards the castle"));
    }

    #[test]
    fn empty_conditions_pass() {
        let mut m = meta();
        m.activation_conditions = Some(ActivationConditions::default());
        assert!(m.should_activate(""));
    }
}
