//! Generation-time interceptor
//!
//! The single callable the host invokes before every generation. It runs a
//! retrieval pass over the current chat, deduplicates against injections
//! that are already active, formats the payload, and hands it to the
//! host's prompt-injection API. It mutates injection state and returns
//! nothing; failures are logged, never propagated into generation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use vecthare_application::query::{
    QueryOrchestrator, RetrievalSettings, deduplicate_against_active, format_injection,
};
use vecthare_domain::error::Result;
use vecthare_domain::ports::{GenerationType, PromptInjection, PromptInjector};
use vecthare_domain::value_objects::ChatMessage;

/// Injection slot owned by the retrieval substrate
pub const INJECTION_ID: &str = "vecthare_rag";

/// The host-facing prompt interceptor
pub struct RetrievalInterceptor {
    orchestrator: Arc<QueryOrchestrator>,
    injector: Arc<dyn PromptInjector>,
}

impl RetrievalInterceptor {
    /// Create an interceptor over the orchestrator and the host injector
    pub fn new(orchestrator: Arc<QueryOrchestrator>, injector: Arc<dyn PromptInjector>) -> Self {
        Self {
            orchestrator,
            injector,
        }
    }

    /// The entry point registered with the host.
    ///
    /// Invoked as `(chat, contextSize, abortSignal, generationType)`; the
    /// context size is the host's token budget, which the substrate does
    /// not consume directly.
    pub async fn intercept(
        &self,
        chat: &[ChatMessage],
        _context_size: usize,
        abort: CancellationToken,
        generation_type: GenerationType,
        settings: &RetrievalSettings,
    ) {
        // Background generations never get retrieval context
        if generation_type == GenerationType::Quiet {
            return;
        }

        let run = async {
            if let Err(e) = self.run(chat, settings).await {
                tracing::error!("Retrieval interceptor failed: {e}");
            }
        };

        tokio::select! {
            () = run => {}
            () = abort.cancelled() => {
                tracing::debug!("Retrieval interceptor aborted by the host");
            }
        }
    }

    async fn run(&self, chat: &[ChatMessage], settings: &RetrievalSettings) -> Result<()> {
        let outcome = self.orchestrator.retrieve(chat, settings).await?;
        for (collection, error) in &outcome.errors {
            tracing::warn!("Collection '{collection}' skipped: {error}");
        }

        let active = self.injector.active_injections().await?;
        let mut results = deduplicate_against_active(outcome.results, &active);
        results.truncate(settings.insert_count);

        if results.is_empty() {
            self.injector.clear(INJECTION_ID).await?;
            return Ok(());
        }

        let content = format_injection(
            &results,
            &settings.rag_context,
            settings.rag_xml_tag.as_deref(),
        );
        tracing::debug!(
            "Injecting {} retrieved fragments ({} chars)",
            results.len(),
            content.len()
        );

        self.injector
            .inject(PromptInjection {
                id: INJECTION_ID.to_string(),
                content,
                position: settings.position,
                depth: settings.depth,
                scan: false,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use vecthare_application::backends::BackendRegistry;
    use vecthare_application::collections::CollectionRegistry;
    use vecthare_domain::ports::{ActiveInjection, SettingsStore};

    #[derive(Default)]
    struct RecordingInjector {
        injected: Mutex<Vec<PromptInjection>>,
        cleared: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PromptInjector for RecordingInjector {
        async fn active_injections(&self) -> Result<Vec<ActiveInjection>> {
            Ok(Vec::new())
        }

        async fn inject(&self, injection: PromptInjection) -> Result<()> {
            self.injected.lock().unwrap().push(injection);
            Ok(())
        }

        async fn clear(&self, id: &str) -> Result<()> {
            self.cleared.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullStore;

    #[async_trait]
    impl SettingsStore for NullStore {
        async fn load(&self, _key: &str) -> Result<Option<serde_json::Value>> {
            Ok(None)
        }
        async fn save(&self, _key: &str, _value: serde_json::Value) -> Result<()> {
            Ok(())
        }
    }

    fn interceptor_with_empty_registry() -> (RetrievalInterceptor, Arc<RecordingInjector>) {
        let backends = Arc::new(BackendRegistry::default());
        let collections = Arc::new(CollectionRegistry::new(Arc::new(NullStore)));
        let orchestrator = Arc::new(QueryOrchestrator::new(backends, collections));
        let injector = Arc::new(RecordingInjector::default());
        let as_port: Arc<dyn PromptInjector> = Arc::clone(&injector) as Arc<dyn PromptInjector>;
        (RetrievalInterceptor::new(orchestrator, as_port), injector)
    }

    #[tokio::test]
    async fn empty_retrieval_clears_the_injection_slot() {
        let (interceptor, injector) = interceptor_with_empty_registry();
        let chat = vec![ChatMessage::new(0, "User", "hello there")];
        interceptor
            .intercept(
                &chat,
                4096,
                CancellationToken::new(),
                GenerationType::Normal,
                &RetrievalSettings::default(),
            )
            .await;

        assert!(injector.injected.lock().unwrap().is_empty());
        assert_eq!(injector.cleared.lock().unwrap().as_slice(), [INJECTION_ID]);
    }

    #[tokio::test]
    async fn quiet_generations_are_skipped() {
        let (interceptor, injector) = interceptor_with_empty_registry();
        let chat = vec![ChatMessage::new(0, "User", "hello there")];
        interceptor
            .intercept(
                &chat,
                4096,
                CancellationToken::new(),
                GenerationType::Quiet,
                &RetrievalSettings::default(),
            )
            .await;

        assert!(injector.injected.lock().unwrap().is_empty());
        assert!(injector.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_pass() {
        let (interceptor, injector) = interceptor_with_empty_registry();
        let token = CancellationToken::new();
        token.cancel();
        let chat = vec![ChatMessage::new(0, "User", "hello there")];
        interceptor
            .intercept(
                &chat,
                4096,
                token,
                GenerationType::Normal,
                &RetrievalSettings::default(),
            )
            .await;
        // Nothing guaranteed to run after cancellation
        assert!(injector.injected.lock().unwrap().is_empty());
    }
}
