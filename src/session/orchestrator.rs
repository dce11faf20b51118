//! Conversation orchestrator
//!
//! Runs one turn as `Start → Routed → Retrieved? → Composed → Done`. The
//! session's entity memory stays locked for the whole turn and the memory
//! commit is applied only once composition has finished, so a turn that is
//! dropped midway leaves memory untouched.

use super::manager::{SessionManager, SessionSnapshot};
use crate::compose::{ResponseComposer, TurnResult};
use crate::config::{resolve_secrets_from_env, ClassifierBackend, IndexConfig, ResumeChatConfig};
use crate::error::Result;
use crate::providers::{EmbeddingService, LanguageModel, OpenAiClient, TokenUsage};
use crate::retrieval::{InMemoryIndex, QdrantIndex, RetrievalDispatcher, VectorIndex};
use crate::routing::{IntentClassifier, IntentRouter, KeywordClassifier, LlmIntentClassifier};
use crate::usage::{TracingUsageSink, UsageEvent, UsageSink, UsageStage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Handles conversational turns across sessions
pub struct Orchestrator {
    router: IntentRouter,
    dispatcher: RetrievalDispatcher,
    composer: ResponseComposer,
    sessions: Arc<SessionManager>,
    usage: Arc<dyn UsageSink>,
}

impl Orchestrator {
    /// Assemble an orchestrator from explicit collaborators
    pub fn new(
        config: &ResumeChatConfig,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingService>,
        model: Arc<dyn LanguageModel>,
        classifier: Arc<dyn IntentClassifier>,
        usage: Arc<dyn UsageSink>,
    ) -> Result<Self> {
        let router = IntentRouter::new(&config.router, classifier)?;
        let dispatcher = RetrievalDispatcher::new(index, embedder, config.retrieval.clone());
        let composer = ResponseComposer::new(
            model,
            Duration::from_secs(config.models.generation_timeout_secs.max(1)),
        );

        Ok(Self {
            router,
            dispatcher,
            composer,
            sessions: Arc::new(SessionManager::new(config.memory.clone())),
            usage,
        })
    }

    /// Build the production stack described by `config`
    pub async fn from_config(config: &ResumeChatConfig) -> Result<Self> {
        let secrets = resolve_secrets_from_env(config);
        let api_key = secrets.get(&config.models.api_key_ref).cloned();
        if api_key.is_none() {
            tracing::warn!(
                "No API key found in ${}, model calls will be unauthenticated",
                config.models.api_key_ref.to_uppercase()
            );
        }
        let client = Arc::new(OpenAiClient::new(config.models.clone(), api_key)?);

        let index: Arc<dyn VectorIndex> = match &config.index {
            IndexConfig::Memory {
                snapshot: Some(path),
            } => Arc::new(InMemoryIndex::load_snapshot(path).await?),
            IndexConfig::Memory { snapshot: None } => {
                tracing::warn!("No index snapshot configured, starting with an empty index");
                Arc::new(InMemoryIndex::new())
            }
            IndexConfig::Qdrant {
                url,
                collection,
                api_key_ref,
                scroll_limit,
                max_retries,
            } => Arc::new(QdrantIndex::new(
                url.clone(),
                collection.clone(),
                secrets.get(api_key_ref).cloned(),
                *scroll_limit,
                *max_retries,
                Duration::from_secs(config.retrieval.call_timeout_secs.max(1)),
            )?),
        };

        let classifier: Arc<dyn IntentClassifier> = match config.router.classifier {
            ClassifierBackend::Keyword => Arc::new(KeywordClassifier::with_default_rules()?),
            ClassifierBackend::Llm => Arc::new(LlmIntentClassifier::new(client.clone())),
        };

        tracing::info!(
            index = index.name(),
            classifier = classifier.name(),
            model = LanguageModel::name(client.as_ref()),
            "Orchestrator ready"
        );

        Self::new(
            config,
            index,
            client.clone(),
            client,
            classifier,
            Arc::new(TracingUsageSink),
        )
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Handle one user turn.
    ///
    /// Always yields exactly one [`TurnResult`]; the only error is an
    /// invalid session id.
    pub async fn handle_turn(&self, text: &str, session_id: &str) -> Result<TurnResult> {
        let session = self.sessions.get_or_create(session_id).await?;
        let turn_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("turn", session = %session_id, turn = %turn_id);

        async {
            let text = text.trim();
            if text.is_empty() {
                tracing::debug!("Empty input, replying with guidance");
                let mut result = TurnResult::guidance();
                result.id = turn_id.clone();
                session.record_turn(&result.usage).await;
                return Ok(result);
            }

            let mut memory = session.lock_memory().await;
            let history = session.history().await;

            // Routed
            let started = Instant::now();
            let routed = self.router.route(text, &memory, &history).await;
            self.emit(session_id, &turn_id, UsageStage::Route, started, routed.usage, true);
            tracing::info!(
                route = ?routed.decision.mode(),
                identifiers = routed.decision.identifiers().len(),
                "Routed"
            );

            // Retrieved
            let started = Instant::now();
            let retrieval = match self.dispatcher.dispatch(&routed.decision).await {
                Ok(retrieval) => {
                    if retrieval.is_some() {
                        self.emit(session_id, &turn_id, UsageStage::Retrieve, started, None, true);
                    }
                    retrieval
                }
                Err(e) => {
                    tracing::warn!("Retrieval unavailable: {}", e);
                    self.emit(session_id, &turn_id, UsageStage::Retrieve, started, None, false);
                    let mut result = TurnResult::retrieval_unavailable();
                    result.id = turn_id.clone();
                    add_usage(&mut result.usage, routed.usage);
                    session.record_exchange(text, &result.answer).await;
                    drop(memory);
                    session.record_turn(&result.usage).await;
                    return Ok(result);
                }
            };

            // Composed
            let started = Instant::now();
            let mut result = self
                .composer
                .compose(&routed.decision, retrieval.as_ref(), &history)
                .await;
            let composed_usage = (!result.usage.is_empty()).then_some(result.usage);
            let ok = result.source != crate::compose::AnswerSource::GenerationFailure;
            self.emit(session_id, &turn_id, UsageStage::Compose, started, composed_usage, ok);
            result.id = turn_id.clone();
            add_usage(&mut result.usage, routed.usage);

            // Done
            if ResponseComposer::commit(&mut memory, &result) {
                tracing::debug!(anchor = ?memory.anchor(), "Memory committed");
            }
            session.record_exchange(text, &result.answer).await;
            drop(memory);
            session.record_turn(&result.usage).await;

            tracing::info!(source = ?result.source, references = result.references.len(), "Turn done");
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Clear a session's memory. Returns false when the session is unknown.
    pub async fn reset_session(&self, session_id: &str) -> bool {
        self.sessions.reset(session_id).await
    }

    pub async fn session_snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        let session = self.sessions.get(session_id).await?;
        Some(session.snapshot().await)
    }

    /// Drop sessions idle for longer than `max_idle`
    pub async fn cleanup_inactive(&self, max_idle: Duration) -> usize {
        let max_idle_ms = i64::try_from(max_idle.as_millis()).unwrap_or(i64::MAX);
        self.sessions.cleanup_inactive(max_idle_ms).await
    }

    fn emit(
        &self,
        session_id: &str,
        turn_id: &str,
        stage: UsageStage,
        started: Instant,
        tokens: Option<TokenUsage>,
        ok: bool,
    ) {
        self.usage.record(UsageEvent {
            session_id: session_id.to_string(),
            turn_id: turn_id.to_string(),
            stage,
            latency_ms: started.elapsed().as_millis() as u64,
            tokens,
            ok,
        });
    }
}

fn add_usage(total: &mut TokenUsage, usage: Option<TokenUsage>) {
    if let Some(usage) = usage {
        total.add(&usage);
    }
}
