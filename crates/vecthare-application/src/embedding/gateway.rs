//! Embedding Gateway
//!
//! Provider-agnostic façade over the registered embedding providers.
//! Resolves a provider by source name, splits work into the provider's
//! batch size, reassembles vectors in input order, and annotates
//! out-of-memory failures with batch-shape diagnostics.

use std::sync::Arc;

use dashmap::DashMap;

use vecthare_domain::error::{Error, OomDiagnostics, Result, is_oom_signature};
use vecthare_domain::ports::EmbeddingProvider;

use crate::registry::{EmbeddingProviderConfig, resolve_embedding_provider};

/// Provider-agnostic embedding façade
///
/// Instances are cheap handles; resolved providers are cached internally so
/// repeated calls with the same source/model/URL reuse transports (and, for
/// the local transformer runtime, the loaded model).
pub struct EmbeddingGateway {
    providers: DashMap<String, Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    /// Embed `texts` with the configured source, preserving order.
    ///
    /// Returns one vector per input text. Configuration problems (unknown
    /// source, invalid URL) surface before any network call.
    pub async fn embed(
        &self,
        config: &EmbeddingProviderConfig,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.provider(config)?;
        let chunk_size = provider.batch_limit().chunk_size(texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(chunk_size) {
            let embeddings = provider
                .embed_batch(batch)
                .await
                .map_err(|e| annotate_oom(e, &provider, config, batch))?;

            if embeddings.len() != batch.len() {
                return Err(Error::protocol(format!(
                    "Embedding count mismatch from '{}': sent {}, got {}",
                    provider.provider_name(),
                    batch.len(),
                    embeddings.len()
                )));
            }
            vectors.extend(embeddings.into_iter().map(|e| e.vector));
        }

        Ok(vectors)
    }

    /// Embed a single text
    pub async fn embed_one(
        &self,
        config: &EmbeddingProviderConfig,
        text: &str,
    ) -> Result<Vec<f32>> {
        let mut vectors = self.embed(config, &[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::protocol("Provider returned no embedding"))
    }

    /// Discover the vector length of the configured source/model.
    ///
    /// Uses the provider's declared dimensions when known, otherwise embeds
    /// a probe string and measures.
    pub async fn probe_dimensions(&self, config: &EmbeddingProviderConfig) -> Result<usize> {
        let provider = self.provider(config)?;
        if let Some(dims) = provider.dimensions() {
            return Ok(dims);
        }
        let vector = self.embed_one(config, "dimension probe").await?;
        if vector.is_empty() {
            return Err(Error::protocol(format!(
                "Provider '{}' returned an empty probe vector",
                provider.provider_name()
            )));
        }
        Ok(vector.len())
    }

    /// Number of texts to embed per sync batch for a source.
    ///
    /// The local transformer runtime and ollama process one text at a time;
    /// everything else takes small batches.
    pub fn sync_batch_size(source: &str) -> usize {
        match source.to_ascii_lowercase().as_str() {
            "transformers" | "ollama" => 1,
            _ => 5,
        }
    }

    /// Resolve and cache the provider for a config
    fn provider(&self, config: &EmbeddingProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let key = cache_key(config);
        if let Some(provider) = self.providers.get(&key) {
            return Ok(Arc::clone(&provider));
        }
        let provider = resolve_embedding_provider(config).map_err(Error::config)?;
        self.providers.insert(key, Arc::clone(&provider));
        Ok(provider)
    }

    /// Drop all cached providers (model or URL changes take effect on next use)
    pub fn reset(&self) {
        self.providers.clear();
    }
}

impl Default for EmbeddingGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_key(config: &EmbeddingProviderConfig) -> String {
    format!(
        "{}|{}|{}",
        config.source.to_ascii_lowercase(),
        config.model.as_deref().unwrap_or(""),
        config.transport.api_url.as_deref().unwrap_or("")
    )
}

/// Re-wrap a provider error as an OOM with diagnostics when the message
/// carries the embedding-runtime exhaustion signature.
fn annotate_oom(
    error: Error,
    provider: &Arc<dyn EmbeddingProvider>,
    config: &EmbeddingProviderConfig,
    batch: &[String],
) -> Error {
    let message = error.to_string();
    if !is_oom_signature(&message) {
        return error;
    }

    let (largest_chunk_index, largest_chunk_len) = batch
        .iter()
        .enumerate()
        .map(|(i, t)| (i, t.chars().count()))
        .max_by_key(|&(_, len)| len)
        .unwrap_or((0, 0));

    Error::Oom {
        message,
        diagnostics: OomDiagnostics {
            provider: provider.provider_name().to_string(),
            model: config.model.clone().unwrap_or_default(),
            batch_size: batch.len(),
            largest_chunk_len,
            largest_chunk_index,
        },
    }
}

/// A provider response that flattened a one-item batch into a bare vector.
///
/// Some single-text endpoints answer `[0.1, 0.2, ...]` instead of
/// `[[0.1, 0.2, ...]]`; normalize to list-of-lists before use.
pub fn normalize_single_flattened(value: &serde_json::Value) -> Option<Vec<Vec<f32>>> {
    let array = value.as_array()?;
    if array.is_empty() {
        return Some(Vec::new());
    }
    if array[0].is_number() {
        // Flat numeric array: a single embedding
        let vector: Vec<f32> = array
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        return Some(vec![vector]);
    }
    let mut out = Vec::with_capacity(array.len());
    for item in array {
        let inner = item.as_array()?;
        out.push(
            inner
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vecthare_domain::value_objects::Embedding;

    #[test]
    fn flattened_single_batch_normalizes_to_nested() {
        let flat = json!([0.1, 0.2, 0.3]);
        let nested = normalize_single_flattened(&flat).unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].len(), 3);
    }

    #[test]
    fn nested_batches_pass_through() {
        let value = json!([[0.1, 0.2], [0.3, 0.4]]);
        let nested = normalize_single_flattened(&value).unwrap();
        assert_eq!(nested.len(), 2);
    }

    #[test]
    fn non_array_input_is_rejected() {
        assert!(normalize_single_flattened(&json!({"not": "an array"})).is_none());
    }

    #[test]
    fn sync_batch_sizes_follow_provider_capabilities() {
        assert_eq!(EmbeddingGateway::sync_batch_size("transformers"), 1);
        assert_eq!(EmbeddingGateway::sync_batch_size("ollama"), 1);
        assert_eq!(EmbeddingGateway::sync_batch_size("openai"), 5);
        assert_eq!(EmbeddingGateway::sync_batch_size("cohere"), 5);
    }

    #[test]
    fn oom_annotation_finds_largest_chunk() {
        struct Fake;
        #[async_trait::async_trait]
        impl EmbeddingProvider for Fake {
            async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
                unreachable!()
            }
            fn provider_name(&self) -> &str {
                "fake"
            }
        }

        let provider: Arc<dyn EmbeddingProvider> = Arc::new(Fake);
        let config = EmbeddingProviderConfig::new("fake").with_model("fake-model");
        let batch = vec!["ab".to_string(), "abcdef".to_string(), "abc".to_string()];
        let err = annotate_oom(
            Error::internal("OrtRun failed: allocation"),
            &provider,
            &config,
            &batch,
        );
        match err {
            Error::Oom { diagnostics, .. } => {
                assert_eq!(diagnostics.batch_size, 3);
                assert_eq!(diagnostics.largest_chunk_index, 1);
                assert_eq!(diagnostics.largest_chunk_len, 6);
                assert_eq!(diagnostics.model, "fake-model");
            }
            other => panic!("expected Oom, got {other:?}"),
        }
    }
}
