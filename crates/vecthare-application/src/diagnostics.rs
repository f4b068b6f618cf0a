//! Diagnostics
//!
//! Self-checks the host surfaces in its health panel: an embedding probe,
//! a storage round-trip against a throwaway collection, dimension and
//! hash-sync checks, duplicate detection, and sanity checks over the pure
//! scoring math.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use vecthare_domain::error::FixAction;
use vecthare_domain::value_objects::{
    BackendKind, Chunk, ChunkMetadata, CollectionId, DecayMode, DecaySettings, DecayType,
    QueryRequest,
};

use crate::backends::BackendRegistry;
use crate::collections::CollectionRegistry;
use crate::embedding::EmbeddingGateway;
use crate::fusion::{reciprocal_rank_fusion, weighted_combination};
use crate::registry::{EmbeddingProviderConfig, VectorBackendConfig};
use crate::results::ScoredResult;
use crate::sync::{ChunkSource, plan_sync};
use crate::temporal::age_multiplier;

/// One diagnostic finding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticCheck {
    /// Check name
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable detail
    pub message: String,
    /// Whether a user remediation exists
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fixable: bool,
    /// The remediation, when fixable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_action: Option<FixAction>,
}

impl DiagnosticCheck {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.into(),
            fixable: false,
            fix_action: None,
        }
    }

    fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.into(),
            fixable: false,
            fix_action: None,
        }
    }

    fn fixable(mut self, action: FixAction) -> Self {
        self.fixable = true;
        self.fix_action = Some(action);
        self
    }
}

/// Full diagnostics report
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    /// Individual checks in execution order
    pub checks: Vec<DiagnosticCheck>,
}

impl DiagnosticsReport {
    /// Whether every check passed
    pub fn healthy(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// Run the full diagnostics routine.
///
/// `chunk_source` enables the hash-sync check; without it only the
/// source-independent checks run.
pub async fn run_diagnostics(
    gateway: &EmbeddingGateway,
    embedding: &EmbeddingProviderConfig,
    backends: &BackendRegistry,
    backend_kind: BackendKind,
    backend_config: &VectorBackendConfig,
    collections: &CollectionRegistry,
    chunk_source: Option<&dyn ChunkSource>,
) -> DiagnosticsReport {
    let mut report = DiagnosticsReport::default();

    // Embedding probe
    let probe_dims = match gateway.probe_dimensions(embedding).await {
        Ok(dims) => {
            report.checks.push(DiagnosticCheck::pass(
                "embedding-probe",
                format!("'{}' produced a {dims}-dimension vector", embedding.source),
            ));
            Some(dims)
        }
        Err(e) => {
            report.checks.push(DiagnosticCheck::fail(
                "embedding-probe",
                format!("Embedding probe failed: {e}"),
            ));
            None
        }
    };

    // Storage round-trip against a throwaway collection
    storage_probe(&mut report, gateway, embedding, backends, backend_kind, backend_config).await;

    // Dimension match against registered lineage
    if let Some(dims) = probe_dims {
        dimension_check(&mut report, collections, embedding, dims).await;
    }

    // Duplicate hashes across registered collections
    duplicate_check(&mut report, backends, backend_kind, backend_config, collections).await;

    // Stored hashes versus what the source text produces right now
    if let Some(source) = chunk_source {
        hash_sync_check(&mut report, backends, backend_kind, backend_config, collections, source)
            .await;
    }

    // Pure-math sanity checks
    report.checks.push(decay_sanity_check());
    report.checks.push(rrf_sanity_check());
    report.checks.push(weighted_sanity_check());
    report.checks.push(keyword_sanity_check());

    report
}

async fn storage_probe(
    report: &mut DiagnosticsReport,
    gateway: &EmbeddingGateway,
    embedding: &EmbeddingProviderConfig,
    backends: &BackendRegistry,
    kind: BackendKind,
    config: &VectorBackendConfig,
) {
    const NAME: &str = "vector-storage-probe";
    let collection = CollectionId::new("test", "diagnostics-probe");

    let backend = match backends.acquire(kind, config, false).await {
        Ok(Some(b)) => b,
        Ok(None) => {
            report
                .checks
                .push(DiagnosticCheck::fail(NAME, format!("Backend '{kind}' unavailable")));
            return;
        }
        Err(e) => {
            report
                .checks
                .push(DiagnosticCheck::fail(NAME, format!("Backend acquire failed: {e}")));
            return;
        }
    };

    let mut chunk = Chunk::new(
        "Diagnostics probe chunk",
        0,
        ChunkMetadata::with_source("test"),
    );
    if let Ok(vector) = gateway.embed_one(embedding, &chunk.text).await {
        chunk.vector = Some(vector);
    }

    let outcome: Result<(), String> = async {
        backend
            .insert_chunks(&collection, std::slice::from_ref(&chunk))
            .await
            .map_err(|e| format!("insert failed: {e}"))?;
        let hashes = backend
            .saved_hashes(&collection)
            .await
            .map_err(|e| format!("list failed: {e}"))?;
        if !hashes.contains(&chunk.hash) {
            return Err("inserted hash missing from listing".to_string());
        }
        let request = QueryRequest::text("diagnostics probe", 1, 0.0);
        backend
            .query(&collection, &request)
            .await
            .map_err(|e| format!("query failed: {e}"))?;
        Ok(())
    }
    .await;

    // Always clean up the probe collection
    if let Err(e) = backend.purge(&collection).await {
        tracing::warn!("Failed to clean up diagnostics collection: {e}");
    }

    report.checks.push(match outcome {
        Ok(()) => DiagnosticCheck::pass(NAME, "insert, list, query and purge all round-tripped"),
        Err(message) => DiagnosticCheck::fail(NAME, message),
    });
}

async fn dimension_check(
    report: &mut DiagnosticsReport,
    collections: &CollectionRegistry,
    embedding: &EmbeddingProviderConfig,
    current_dims: usize,
) {
    const NAME: &str = "dimension-match";
    let model = embedding.model.clone().unwrap_or_default();
    let mismatched: Vec<String> = collections
        .list()
        .await
        .into_iter()
        .filter(|meta| meta.source == embedding.source && meta.model != model)
        .map(|meta| meta.id.to_string())
        .collect();

    if mismatched.is_empty() {
        report.checks.push(DiagnosticCheck::pass(
            NAME,
            format!("all collections agree with the current {current_dims}-dimension model"),
        ));
    } else {
        report.checks.push(
            DiagnosticCheck::fail(
                NAME,
                format!(
                    "collections built with a different model: {}",
                    mismatched.join(", ")
                ),
            )
            .fixable(FixAction::Revectorize),
        );
    }
}

async fn duplicate_check(
    report: &mut DiagnosticsReport,
    backends: &BackendRegistry,
    kind: BackendKind,
    config: &VectorBackendConfig,
    collections: &CollectionRegistry,
) {
    const NAME: &str = "duplicate-hashes";
    let Ok(Some(backend)) = backends.acquire(kind, config, false).await else {
        report
            .checks
            .push(DiagnosticCheck::fail(NAME, format!("Backend '{kind}' unavailable")));
        return;
    };

    let mut duplicates: HashMap<String, usize> = HashMap::new();
    for meta in collections.list().await {
        if meta.backend != kind {
            continue;
        }
        match backend.saved_hashes(&meta.id).await {
            Ok(hashes) => {
                let mut seen = HashSet::new();
                let dupes = hashes.iter().filter(|h| !seen.insert(**h)).count();
                if dupes > 0 {
                    duplicates.insert(meta.id.to_string(), dupes);
                }
            }
            Err(e) => {
                tracing::warn!("Duplicate check skipped '{}': {e}", meta.id);
            }
        }
    }

    if duplicates.is_empty() {
        report
            .checks
            .push(DiagnosticCheck::pass(NAME, "no duplicate hashes found"));
    } else {
        let detail = duplicates
            .iter()
            .map(|(id, n)| format!("{id} ({n})"))
            .collect::<Vec<_>>()
            .join(", ");
        report.checks.push(
            DiagnosticCheck::fail(NAME, format!("duplicate hashes in: {detail}"))
                .fixable(FixAction::Deduplicate),
        );
    }
}

async fn hash_sync_check(
    report: &mut DiagnosticsReport,
    backends: &BackendRegistry,
    kind: BackendKind,
    config: &VectorBackendConfig,
    collections: &CollectionRegistry,
    source: &dyn ChunkSource,
) {
    const NAME: &str = "hash-sync";
    let Ok(Some(backend)) = backends.acquire(kind, config, false).await else {
        report
            .checks
            .push(DiagnosticCheck::fail(NAME, format!("Backend '{kind}' unavailable")));
        return;
    };

    let mut drifted: Vec<String> = Vec::new();
    for meta in collections.list().await {
        if meta.backend != kind || !meta.enabled {
            continue;
        }
        let saved = match backend.saved_hashes(&meta.id).await {
            Ok(hashes) => hashes,
            Err(e) => {
                tracing::warn!("Hash-sync check skipped '{}': {e}", meta.id);
                continue;
            }
        };
        let desired = match source.current_chunks(&meta.id).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("Hash-sync check skipped '{}': {e}", meta.id);
                continue;
            }
        };
        let plan = plan_sync(&saved, desired);
        if !plan.is_empty() {
            drifted.push(format!(
                "{} (+{} / -{})",
                meta.id,
                plan.to_insert.len(),
                plan.to_delete.len()
            ));
        }
    }

    if drifted.is_empty() {
        report
            .checks
            .push(DiagnosticCheck::pass(NAME, "stored hashes match the source text"));
    } else {
        report.checks.push(DiagnosticCheck::fail(
            NAME,
            format!("collections out of sync: {}", drifted.join(", ")),
        ));
    }
}

/// Rebuild a collection without duplicate hashes.
///
/// Lists the stored hashes, recovers chunk text for the duplicated ones
/// through a broad low-threshold query, deletes the affected hashes, and
/// re-inserts one chunk per hash, re-embedding through `gateway` so
/// client-side-vector backends accept the rebuilt chunks. The recovery
/// query is O(N) in collection size; backends with a targeted retrieval
/// primitive make this cheap, the rest pay the broad scan. Returns how
/// many duplicate hashes were repaired.
pub async fn fix_duplicate_hashes(
    backend: &std::sync::Arc<dyn vecthare_domain::ports::VectorBackend>,
    collection: &CollectionId,
    gateway: &EmbeddingGateway,
    embedding: &EmbeddingProviderConfig,
) -> vecthare_domain::error::Result<usize> {
    let hashes = backend.saved_hashes(collection).await?;
    let mut seen = HashSet::new();
    let duplicated: Vec<u32> = hashes.iter().copied().filter(|h| !seen.insert(*h)).collect();
    if duplicated.is_empty() {
        return Ok(0);
    }

    // Broad recovery query: everything the backend will hand back
    let request = QueryRequest::text("", 10_000, 0.0);
    let recovered = backend.query(collection, &request).await?;
    let mut texts: HashMap<u32, Chunk> = HashMap::new();
    for item in recovered.items {
        texts.entry(item.hash).or_insert_with(|| Chunk {
            hash: item.hash,
            text: item.text,
            index: 0,
            vector: None,
            metadata: item.metadata,
        });
    }

    let mut repaired = 0usize;
    for hash in &duplicated {
        let Some(chunk) = texts.get(hash) else {
            tracing::warn!("Cannot rebuild duplicate hash {hash}: text not recoverable");
            continue;
        };
        let mut rebuilt = chunk.clone();
        if let Ok(vector) = gateway.embed_one(embedding, &rebuilt.text).await {
            rebuilt.vector = Some(vector);
        }
        backend.delete_hashes(collection, &[*hash]).await?;
        backend
            .insert_chunks(collection, std::slice::from_ref(&rebuilt))
            .await?;
        repaired += 1;
    }

    tracing::info!(
        "Repaired {repaired}/{} duplicate hashes in '{collection}'",
        duplicated.len()
    );
    Ok(repaired)
}

fn decay_sanity_check() -> DiagnosticCheck {
    const NAME: &str = "temporal-decay-sanity";
    let settings = DecaySettings {
        enabled: true,
        decay_type: DecayType::Decay,
        mode: DecayMode::Exponential,
        half_life: 50.0,
        linear_rate: 0.01,
        min_relevance: 0.1,
        max_boost: 1.5,
    };
    let at_zero = age_multiplier(&settings, 0.0);
    let at_half_life = age_multiplier(&settings, 50.0);

    if (at_zero - 1.0).abs() < 1e-6 && (at_half_life - 0.5).abs() < 1e-3 {
        DiagnosticCheck::pass(NAME, "multiplier is 1.0 at age 0 and 0.5 at the half-life")
    } else {
        DiagnosticCheck::fail(
            NAME,
            format!("unexpected multipliers: age0={at_zero}, halfLife={at_half_life}"),
        )
    }
}

fn rrf_sanity_check() -> DiagnosticCheck {
    const NAME: &str = "rrf-sanity";
    let vector = vec![ScoredResult::new(1, 0.95), ScoredResult::new(2, 0.85)];
    let text = vec![ScoredResult::new(1, 8.5), ScoredResult::new(3, 7.2)];
    let fused = reciprocal_rank_fusion(vector, text, 60.0);

    let doc1_first = fused.first().is_some_and(|r| r.hash == 1);
    let in_range = fused.iter().all(|r| r.score > 0.0 && r.score <= 1.0);
    if doc1_first && in_range && fused.len() == 3 {
        DiagnosticCheck::pass(NAME, "doubly-ranked document fused first with scores in (0,1]")
    } else {
        DiagnosticCheck::fail(NAME, "reciprocal rank fusion produced unexpected ordering")
    }
}

fn weighted_sanity_check() -> DiagnosticCheck {
    const NAME: &str = "weighted-combination-sanity";
    let vector = vec![
        ScoredResult::new(1, 0.9),
        ScoredResult::new(2, 0.8),
        ScoredResult::new(3, 0.7),
    ];
    let text = vec![ScoredResult::new(3, 9.0), ScoredResult::new(2, 1.0)];
    let fused = weighted_combination(vector, text, 1.0, 0.0);
    let dense_order: Vec<u32> = fused
        .iter()
        .filter(|r| r.vector_score.is_some())
        .map(|r| r.hash)
        .collect();

    if dense_order == vec![1, 2, 3] {
        DiagnosticCheck::pass(NAME, "weights (1, 0) reproduce the dense ranking")
    } else {
        DiagnosticCheck::fail(NAME, format!("dense ranking not reproduced: {dense_order:?}"))
    }
}

fn keyword_sanity_check() -> DiagnosticCheck {
    const NAME: &str = "keyword-extraction-sanity";
    let extractor = crate::keywords::KeywordExtractor::new(crate::keywords::ExtractionLevel::Balanced);
    let keywords = extractor.extract_text_keywords("dragon dragon castle");
    let dragon_first = keywords.first().is_some_and(|k| k.text == "dragon");
    let weights_valid = keywords.iter().all(|k| (1.0..=3.0).contains(&k.weight));

    if dragon_first && weights_valid {
        DiagnosticCheck::pass(NAME, "extraction ranks repeats first with weights in [1, 3]")
    } else {
        DiagnosticCheck::fail(NAME, "keyword extraction produced unexpected weights")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_sanity_checks_pass() {
        assert!(decay_sanity_check().passed);
        assert!(rrf_sanity_check().passed);
        assert!(weighted_sanity_check().passed);
        assert!(keyword_sanity_check().passed);
    }

    #[test]
    fn failed_checks_mark_report_unhealthy() {
        let mut report = DiagnosticsReport::default();
        report.checks.push(DiagnosticCheck::pass("a", "ok"));
        assert!(report.healthy());
        report
            .checks
            .push(DiagnosticCheck::fail("b", "broken").fixable(FixAction::Revectorize));
        assert!(!report.healthy());
        assert_eq!(report.checks[1].fix_action, Some(FixAction::Revectorize));
    }
}
