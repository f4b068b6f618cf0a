//! Query orchestration
//!
//! The generation-time entry point: builds a search context from recent
//! messages, fans queries out over the enabled collections, fuses dense and
//! sparse rankings, boosts by keywords, applies temporal weighting, and
//! returns the final ordered fragments. A single collection's failure never
//! aborts the pass; it is reported alongside the results.

mod pipeline;
mod settings;

pub use pipeline::{
    apply_keyword_boost, deduplicate_against_active, format_injection, overfetch_count,
};
pub use settings::{
    FusionMethod, HybridSettings, KeywordSettings, KeywordScoringMethod, RetrievalSettings,
    WorldInfoSettings,
};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use vecthare_domain::error::{Error, Result};
use vecthare_domain::value_objects::{
    ChatMessage, CollectionMetadata, CollectionQueryResult, DecaySettings, HybridOptions,
    QueryRequest,
};

use crate::backends::BackendRegistry;
use crate::collections::CollectionRegistry;
use crate::fusion::{reciprocal_rank_fusion, weighted_combination};
use crate::results::{ScoredResult, sort_by_score_desc};
use crate::scoring::{Bm25Document, Bm25Params, Bm25Scorer, apply_bm25_scoring};
use crate::temporal::weight_result;

/// Outcome of one retrieval pass
#[derive(Debug, Default)]
pub struct RetrievalOutcome {
    /// Final ordered fragments, trimmed to `top_k`
    pub results: Vec<ScoredResult>,
    /// Collections that failed, with their error text
    pub errors: HashMap<String, String>,
    /// The search context the queries ran with
    pub context: String,
}

/// Fans retrieval out over enabled collections and re-ranks the merged set
pub struct QueryOrchestrator {
    backends: Arc<BackendRegistry>,
    collections: Arc<CollectionRegistry>,
}

impl QueryOrchestrator {
    /// Create an orchestrator over the shared registries
    pub fn new(backends: Arc<BackendRegistry>, collections: Arc<CollectionRegistry>) -> Self {
        Self {
            backends,
            collections,
        }
    }

    /// Run a retrieval pass for the current chat state.
    pub async fn retrieve(
        &self,
        chat: &[ChatMessage],
        settings: &RetrievalSettings,
    ) -> Result<RetrievalOutcome> {
        let context = build_context(chat, settings.query_messages);
        if context.trim().is_empty() {
            return Ok(RetrievalOutcome::default());
        }

        let candidates: Vec<CollectionMetadata> = {
            let mut active = Vec::new();
            for meta in self.collections.list().await {
                if meta.id.kind() == "lorebook" && !settings.world_info.enabled {
                    continue;
                }
                if meta.should_activate(&context) {
                    active.push(meta);
                }
            }
            active
        };
        if candidates.is_empty() {
            return Ok(RetrievalOutcome {
                context,
                ..RetrievalOutcome::default()
            });
        }

        let request = QueryRequest::text(
            context.clone(),
            overfetch_count(settings.top_k),
            settings.score_threshold,
        );

        // Fan out; collections fail independently
        let queries = candidates.iter().map(|meta| {
            let request = &request;
            let context = context.as_str();
            async move {
                let outcome = self.query_collection(meta, request, context, settings).await;
                (meta.id.to_string(), outcome)
            }
        });
        let outcomes = futures::future::join_all(queries).await;

        let mut results: Vec<ScoredResult> = Vec::new();
        let mut errors = HashMap::new();
        for (collection, outcome) in outcomes {
            match outcome {
                Ok(mut items) => results.append(&mut items),
                Err(e) => {
                    tracing::warn!("Collection '{collection}' failed: {e}");
                    errors.insert(collection, e.to_string());
                }
            }
        }

        self.rerank(&mut results, &candidates, &context, chat, settings);
        results.truncate(settings.top_k);

        Ok(RetrievalOutcome {
            results,
            errors,
            context,
        })
    }

    /// Query one collection through its recorded backend
    async fn query_collection(
        &self,
        meta: &CollectionMetadata,
        request: &QueryRequest,
        context: &str,
        settings: &RetrievalSettings,
    ) -> Result<Vec<ScoredResult>> {
        let kind = meta.backend;
        let backend = self
            .backends
            .acquire(kind, &settings.backend_config, false)
            .await?
            .ok_or_else(|| {
                Error::transient_backend(format!("Backend '{kind}' unavailable"))
            })?;

        // Lorebook collections query with their own shape
        let is_lorebook = meta.id.kind() == "lorebook";
        let lorebook_request;
        let request = if is_lorebook {
            lorebook_request = QueryRequest {
                input: request.input.clone(),
                top_k: overfetch_count(settings.world_info.top_k),
                score_threshold: settings.world_info.threshold,
            };
            &lorebook_request
        } else {
            request
        };

        let use_native_hybrid = settings.hybrid.enabled
            && settings.hybrid.native_prefer
            && backend.supports_hybrid_search();

        let started = Instant::now();
        let queried: Result<CollectionQueryResult> = if use_native_hybrid {
            let options = HybridOptions {
                text: context.to_string(),
                vector_weight: settings.hybrid.vector_weight,
                text_weight: settings.hybrid.text_weight,
                rrf_k: settings.hybrid.rrf_k,
            };
            match backend.hybrid_query(&meta.id, request, &options).await {
                Ok(result) => Ok(result),
                Err(e) => {
                    // Native hybrid failure degrades to dense-only
                    tracing::warn!(
                        "Native hybrid query on '{}' failed, falling back to dense: {e}",
                        meta.id
                    );
                    backend.query(&meta.id, request).await
                }
            }
        } else {
            backend.query(&meta.id, request).await
        };

        let result = match queried {
            Ok(r) => r,
            Err(e) => {
                self.backends.metrics().record_error(kind, &e.to_string());
                if e.invalidates_health() {
                    self.backends.mark_unhealthy(kind).await;
                }
                return Err(e);
            }
        };
        self.backends.metrics().record_query(kind, started.elapsed());

        let collection_key = meta.id.to_string();
        let native_hybrid = result.hybrid_search;
        let mut dense: Vec<ScoredResult> = result
            .items
            .into_iter()
            .map(|item| ScoredResult::from_retrieved(item, &collection_key))
            .collect();
        if is_lorebook {
            dense.truncate(settings.world_info.top_k);
        }

        // Local fusion path when hybrid is wanted but the backend could not
        // serve it natively
        if settings.hybrid.enabled && !native_hybrid {
            Ok(self.fuse_locally(dense, context, settings))
        } else {
            Ok(dense)
        }
    }

    /// Run a local BM25 pass over the candidate texts and fuse it with the
    /// dense ranking.
    fn fuse_locally(
        &self,
        dense: Vec<ScoredResult>,
        context: &str,
        settings: &RetrievalSettings,
    ) -> Vec<ScoredResult> {
        if dense.is_empty() || context.trim().is_empty() {
            return dense;
        }

        let documents: Vec<Bm25Document> = dense
            .iter()
            .map(|r| Bm25Document::new(r.hash, r.text.clone()))
            .collect();
        let scorer = Bm25Scorer::new(&documents, bm25_params(settings));

        let mut text_ranking: Vec<ScoredResult> = dense
            .iter()
            .filter_map(|r| {
                let score = scorer.score(r.hash, context)?;
                if score > 0.0 {
                    let mut copy = r.clone();
                    copy.score = score;
                    Some(copy)
                } else {
                    None
                }
            })
            .collect();
        sort_by_score_desc(&mut text_ranking);

        match settings.hybrid.fusion_method {
            FusionMethod::Rrf => {
                reciprocal_rank_fusion(dense, text_ranking, settings.hybrid.rrf_k)
            }
            FusionMethod::Weighted => weighted_combination(
                dense,
                text_ranking,
                settings.hybrid.vector_weight,
                settings.hybrid.text_weight,
            ),
        }
    }

    /// Steps 4-6 of the pass: keyword scoring, temporal weighting, protect
    /// filtering, final ordering.
    fn rerank(
        &self,
        results: &mut Vec<ScoredResult>,
        candidates: &[CollectionMetadata],
        context: &str,
        chat: &[ChatMessage],
        settings: &RetrievalSettings,
    ) {
        match settings.keyword.scoring_method {
            KeywordScoringMethod::Keyword => apply_keyword_boost(results, context),
            KeywordScoringMethod::Bm25 => {
                apply_bm25_scoring(
                    results,
                    context,
                    settings.hybrid.vector_weight,
                    settings.hybrid.text_weight,
                    bm25_params(settings),
                );
            }
            KeywordScoringMethod::Hybrid => {
                apply_bm25_scoring(
                    results,
                    context,
                    settings.hybrid.vector_weight,
                    settings.hybrid.text_weight,
                    bm25_params(settings),
                );
                apply_keyword_boost(results, context);
            }
        }

        // Temporal weighting, honouring per-collection overrides
        let newest = chat.last().map(|m| m.index).unwrap_or(0);
        let per_collection: HashMap<String, (DecaySettings, HashSet<u32>)> = candidates
            .iter()
            .map(|meta| {
                let decay = meta.decay.clone().unwrap_or_else(|| settings.decay.clone());
                let blind = meta.temporally_blind.iter().copied().collect();
                (meta.id.to_string(), (decay, blind))
            })
            .collect();
        for result in results.iter_mut() {
            let Some(key) = result.collection.as_deref() else {
                continue;
            };
            if let Some((decay, blind)) = per_collection.get(key) {
                if decay.enabled && decay.validate().is_ok() {
                    weight_result(result, decay, newest, blind, None);
                }
            }
        }

        // Protected window: chunks from the last N messages never surface
        if settings.protect > 0 {
            let cutoff = newest - settings.protect as i64;
            results.retain(|r| {
                !r.metadata.is_chat_source()
                    || r.metadata.message_id.is_none_or(|id| id <= cutoff)
            });
        }

        sort_by_score_desc(results);
    }

}

fn bm25_params(settings: &RetrievalSettings) -> Bm25Params {
    Bm25Params {
        k1: settings.keyword.bm25_k1,
        b: settings.keyword.bm25_b,
        ..Bm25Params::default()
    }
}

/// Concatenate the last `count` messages into the search context
fn build_context(chat: &[ChatMessage], count: usize) -> String {
    let count = count.max(1);
    let start = chat.len().saturating_sub(count);
    chat[start..]
        .iter()
        .map(|m| format!("{}: {}", m.name, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_takes_the_trailing_messages() {
        let chat: Vec<ChatMessage> = (0..5)
            .map(|i| ChatMessage::new(i, "A", format!("message {i}")))
            .collect();
        let context = build_context(&chat, 2);
        assert!(context.contains("message 3"));
        assert!(context.contains("message 4"));
        assert!(!context.contains("message 2"));
    }

    #[test]
    fn context_of_empty_chat_is_empty() {
        assert!(build_context(&[], 3).is_empty());
    }
}
