//! FastEmbed Local Embedding Provider
//!
//! In-process embedding through the fastembed ONNX runtime; no external
//! service involved. Uses the Actor pattern to keep the non-Sync model
//! behind a channel: the model loads once and requests flow through an
//! mpsc queue.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::{mpsc, oneshot};

use vecthare_application::registry::{
    EMBEDDING_PROVIDERS, EmbeddingProviderConfig, EmbeddingProviderEntry,
};
use vecthare_domain::error::{Error, Result};
use vecthare_domain::ports::{BatchLimit, EmbeddingProvider};
use vecthare_domain::value_objects::Embedding;

/// Messages for the FastEmbed actor
enum FastEmbedMessage {
    EmbedBatch {
        texts: Vec<String>,
        tx: oneshot::Sender<Result<Vec<Embedding>>>,
    },
}

/// FastEmbed local embedding provider
pub struct FastEmbedProvider {
    sender: mpsc::Sender<FastEmbedMessage>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Create a provider for the model the host configured.
    ///
    /// Unknown model names fall back to the MiniLM default rather than
    /// failing; the local runtime is the zero-config path.
    pub fn from_model_name(model: &str) -> Result<Self> {
        let (embedding_model, dimensions) = match model {
            "" | "all-MiniLM-L6-v2" | "Xenova/all-MiniLM-L6-v2" => {
                (EmbeddingModel::AllMiniLML6V2, 384)
            }
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            "nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
            other => {
                tracing::warn!("Unknown local model '{other}', using all-MiniLM-L6-v2");
                (EmbeddingModel::AllMiniLML6V2, 384)
            }
        };
        Self::with_model(embedding_model, dimensions)
    }

    /// Create a provider for a specific fastembed model
    pub fn with_model(model: EmbeddingModel, dimensions: usize) -> Result<Self> {
        let model_name = format!("{model:?}");
        let init_options = InitOptions::new(model).with_show_download_progress(false);
        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            Error::config(format!("Failed to initialize local embedding model: {e}"))
        })?;

        let (tx, rx) = mpsc::channel(100);
        let mut actor = FastEmbedActor {
            receiver: rx,
            model: text_embedding,
            model_name: model_name.clone(),
        };
        tokio::spawn(async move {
            actor.run().await;
        });

        Ok(Self {
            sender: tx,
            model_name,
            dimensions,
        })
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(FastEmbedMessage::EmbedBatch {
                texts: texts.to_vec(),
                tx,
            })
            .await
            .map_err(|_| Error::internal("Local embedding worker channel closed"))?;

        rx.await
            .unwrap_or_else(|_| Err(Error::internal("Local embedding worker stopped")))
    }

    fn batch_limit(&self) -> BatchLimit {
        // The ONNX runtime runs a fixed-size graph; oversized batches are
        // where its OOM failures come from
        BatchLimit::Single
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    fn provider_name(&self) -> &str {
        "transformers"
    }
}

impl Clone for FastEmbedProvider {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            model_name: self.model_name.clone(),
            dimensions: self.dimensions,
        }
    }
}

/// Internal actor that owns the ONNX model
struct FastEmbedActor {
    receiver: mpsc::Receiver<FastEmbedMessage>,
    model: TextEmbedding,
    model_name: String,
}

impl FastEmbedActor {
    async fn run(&mut self) {
        while let Some(message) = self.receiver.recv().await {
            match message {
                FastEmbedMessage::EmbedBatch { texts, tx } => {
                    let result = self.embed(texts);
                    let _ = tx.send(result);
                }
            }
        }
    }

    fn embed(&mut self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let vectors = self
            .model
            .embed(texts, None)
            .map_err(|e| Error::internal(format!("Local embedding failed: {e}")))?;
        Ok(vectors
            .into_iter()
            .map(|vector| Embedding::new(vector, &self.model_name))
            .collect())
    }
}

// ============================================================================
// Auto-registration via linkme distributed slice
// ============================================================================

use std::sync::Arc;

#[linkme::distributed_slice(EMBEDDING_PROVIDERS)]
static TRANSFORMERS_PROVIDER: EmbeddingProviderEntry = EmbeddingProviderEntry {
    name: "transformers",
    description: "In-process transformer embeddings via fastembed (no external service)",
    factory: |config: &EmbeddingProviderConfig| {
        let model = config.model.clone().unwrap_or_default();
        let provider =
            FastEmbedProvider::from_model_name(&model).map_err(|e| e.to_string())?;
        Ok(Arc::new(provider))
    },
};
