//! Embedding Provider Port

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::Embedding;

/// How many texts a provider accepts per call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchLimit {
    /// One text per request; the gateway loops
    Single,
    /// Up to N texts per request; the gateway splits
    Limited(usize),
    /// Whole arrays pass through
    Unlimited,
}

impl BatchLimit {
    /// The effective chunk size for a batch of `total` texts
    pub fn chunk_size(&self, total: usize) -> usize {
        match self {
            Self::Single => 1,
            Self::Limited(n) => (*n).max(1),
            Self::Unlimited => total.max(1),
        }
    }
}

/// Embedding Provider Interface
///
/// One implementation per embedding source. Implementations own their
/// transport (in-process runtime or HTTP client) and return vectors in the
/// same order as the input texts.
///
/// # Example
///
/// ```ignore
/// use vecthare_domain::ports::EmbeddingProvider;
///
/// let vectors = provider.embed_batch(&texts).await?;
/// assert_eq!(vectors.len(), texts.len());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, preserving order.
    ///
    /// Callers respect [`BatchLimit`]; implementations may still split
    /// internally if their wire protocol demands it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| crate::error::Error::protocol("Provider returned no embedding"))
    }

    /// How many texts fit in one request
    fn batch_limit(&self) -> BatchLimit {
        BatchLimit::Unlimited
    }

    /// Vector length, when the provider knows it without a probe call
    fn dimensions(&self) -> Option<usize> {
        None
    }

    /// Unique provider name (matches the configured `source`)
    fn provider_name(&self) -> &str;

    /// Health check for the provider (default implementation)
    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        Ok(())
    }
}
