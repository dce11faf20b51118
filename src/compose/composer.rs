//! Response composer
//!
//! Turns a routing decision and its retrieval result into a [`TurnResult`],
//! and decides what the turn commits to entity memory.

use super::prompt::{self, ID_SNIPPET_CHARS, SEMANTIC_SNIPPET_CHARS};
use crate::error::{Error, Result};
use crate::memory::EntityMemory;
use crate::providers::{
    ChatTurn, Generation, GenerationRequest, LanguageModel, ModelProfile, TokenUsage,
};
use crate::retrieval::{CandidateId, PassageChunk, RetrievalMode, RetrievalResult};
use crate::routing::RoutingDecision;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which strategy produced an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    ExactId,
    Semantic,
    Comparison,
    GeneralChat,
    /// Retrieval ran and found nothing
    NotFound,
    /// Index or embedding service unreachable
    RetrievalUnavailable,
    /// Generation failed after retrieval
    GenerationFailure,
    /// Empty input, answered with usage hints
    Guidance,
}

impl AnswerSource {
    fn from_mode(mode: RetrievalMode) -> Self {
        match mode {
            RetrievalMode::ExactId => AnswerSource::ExactId,
            RetrievalMode::Semantic => AnswerSource::Semantic,
            RetrievalMode::Comparison => AnswerSource::Comparison,
        }
    }

    /// Whether the answer was grounded in retrieved chunks
    pub fn is_retrieval(&self) -> bool {
        matches!(
            self,
            AnswerSource::ExactId | AnswerSource::Semantic | AnswerSource::Comparison
        )
    }
}

/// One candidate's part of a comparison answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSection {
    pub candidate_id: CandidateId,
    pub found: bool,
    pub body: String,
}

/// Everything one turn produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    /// Turn identifier
    pub id: String,
    pub answer: String,
    pub source: AnswerSource,
    /// Candidates the answer surfaced, in order
    pub references: Vec<CandidateId>,
    /// Per-candidate sections of a comparison
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<CandidateSection>,
    /// Tokens spent on this turn
    pub usage: TokenUsage,
    /// Creation time, Unix milliseconds
    pub created_at: i64,
}

impl TurnResult {
    pub fn new(answer: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            answer: answer.into(),
            source,
            references: Vec::new(),
            sections: Vec::new(),
            usage: TokenUsage::default(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn guidance() -> Self {
        Self::new(prompt::EMPTY_INPUT_ANSWER, AnswerSource::Guidance)
    }

    pub fn retrieval_unavailable() -> Self {
        Self::new(
            prompt::RETRIEVAL_UNAVAILABLE_ANSWER,
            AnswerSource::RetrievalUnavailable,
        )
    }

    pub fn generation_failure() -> Self {
        Self::new(
            prompt::GENERATION_FAILURE_ANSWER,
            AnswerSource::GenerationFailure,
        )
    }

    /// Whether applying this result changes entity memory
    pub fn commits_memory(&self) -> bool {
        self.source.is_retrieval() && !self.references.is_empty()
    }

    fn add_usage(&mut self, usage: Option<TokenUsage>) {
        if let Some(usage) = usage {
            self.usage.add(&usage);
        }
    }
}

/// Builds answers from retrieved chunks
pub struct ResponseComposer {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ResponseComposer {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Compose the answer for a routed turn.
    ///
    /// `retrieval` is `None` only for general chat, and `history` is only
    /// sent with general chat. Never fails: generation errors become a
    /// [`AnswerSource::GenerationFailure`] result.
    pub async fn compose(
        &self,
        decision: &RoutingDecision,
        retrieval: Option<&RetrievalResult>,
        history: &[ChatTurn],
    ) -> TurnResult {
        let composed = match (decision, retrieval) {
            (RoutingDecision::GeneralChat { query }, _) => self.general_chat(query, history).await,
            (RoutingDecision::Retrieve { query, .. }, Some(result)) => match result.mode {
                RetrievalMode::ExactId => self.exact_id(query, result).await,
                RetrievalMode::Semantic => self.semantic(query, result).await,
                RetrievalMode::Comparison => self.comparison(query, result).await,
            },
            (RoutingDecision::Retrieve { .. }, None) => Err(Error::Internal(
                "retrieval decision composed without a retrieval result".to_string(),
            )),
        };

        composed.unwrap_or_else(|e| {
            tracing::warn!("Composition failed: {}", e);
            TurnResult::generation_failure()
        })
    }

    /// Apply a turn's references to memory. Returns whether memory changed.
    pub fn commit(memory: &mut EntityMemory, result: &TurnResult) -> bool {
        if !result.commits_memory() {
            return false;
        }
        let evicted = memory.record(&result.references);
        if !evicted.is_empty() {
            tracing::debug!("Evicted {} identifiers from entity memory", evicted.len());
        }
        true
    }

    async fn general_chat(&self, query: &str, history: &[ChatTurn]) -> Result<TurnResult> {
        let request = GenerationRequest::new(ModelProfile::Chat, prompt::CHAT_SYSTEM_PROMPT, query)
            .with_history(history);
        let generation = self.generate(&request).await?;

        let mut result = TurnResult::new(generation.text, AnswerSource::GeneralChat);
        result.add_usage(generation.usage);
        Ok(result)
    }

    async fn exact_id(&self, query: &str, retrieval: &RetrievalResult) -> Result<TurnResult> {
        let Some(id) = retrieval.identifiers.first() else {
            return Ok(TurnResult::new(prompt::NO_RESULTS_ANSWER, AnswerSource::NotFound));
        };
        if retrieval.is_empty() {
            return Ok(TurnResult::new(
                prompt::unknown_identifier_answer(id.as_str()),
                AnswerSource::NotFound,
            ));
        }

        let grounding = prepare_grounding(retrieval.chunks_for(id), ID_SNIPPET_CHARS);
        let request =
            GenerationRequest::new(ModelProfile::Rag, prompt::profile_system_prompt(), query)
                .with_grounding(grounding);
        let generation = self.generate(&request).await?;

        let mut result = TurnResult::new(generation.text, AnswerSource::ExactId);
        result.references = vec![id.clone()];
        result.add_usage(generation.usage);
        Ok(result)
    }

    async fn semantic(&self, query: &str, retrieval: &RetrievalResult) -> Result<TurnResult> {
        if retrieval.is_empty() {
            return Ok(TurnResult::new(prompt::NO_RESULTS_ANSWER, AnswerSource::NotFound));
        }

        let grounding = prepare_grounding(retrieval.chunks.iter(), SEMANTIC_SNIPPET_CHARS);
        let request =
            GenerationRequest::new(ModelProfile::Rag, prompt::semantic_system_prompt(), query)
                .with_grounding(grounding);
        let generation = self.generate(&request).await?;

        let mut result = TurnResult::new(generation.text, AnswerSource::Semantic);
        result.references = retrieval.identifiers.clone();
        result.add_usage(generation.usage);
        Ok(result)
    }

    async fn comparison(&self, query: &str, retrieval: &RetrievalResult) -> Result<TurnResult> {
        let groups = retrieval.grouped();
        if groups.iter().all(|(_, chunks)| chunks.is_empty()) {
            let ids: Vec<&str> = retrieval.identifiers.iter().map(|i| i.as_str()).collect();
            return Ok(TurnResult::new(
                format!(
                    "No data found for Resume IDs {} in the database.",
                    ids.join(", ")
                ),
                AnswerSource::NotFound,
            ));
        }

        let system_prompt = prompt::comparison_section_system_prompt();
        let requests: Vec<Option<GenerationRequest>> = groups
            .iter()
            .map(|(id, chunks)| {
                if chunks.is_empty() {
                    return None;
                }
                let user_prompt = format!("{}\n\n(Describe only Resume ID {}.)", query, id);
                Some(
                    GenerationRequest::new(ModelProfile::Rag, system_prompt.as_str(), user_prompt)
                        .with_grounding(prepare_grounding(
                            chunks.iter().copied(),
                            ID_SNIPPET_CHARS,
                        )),
                )
            })
            .collect();

        let generations = join_all(requests.iter().map(|request| async move {
            match request {
                Some(request) => self.generate(request).await.map(Some),
                None => Ok(None),
            }
        }))
        .await;

        let mut result = TurnResult::new(String::new(), AnswerSource::Comparison);
        let mut answer = Vec::with_capacity(groups.len());
        for ((id, _), generation) in groups.iter().zip(generations) {
            let section = match generation? {
                Some(generation) => {
                    result.add_usage(generation.usage);
                    CandidateSection {
                        candidate_id: (*id).clone(),
                        found: true,
                        body: generation.text,
                    }
                }
                None => CandidateSection {
                    candidate_id: (*id).clone(),
                    found: false,
                    body: prompt::SECTION_NOT_FOUND.to_string(),
                },
            };
            answer.push(format!("### Resume ID {}\n\n{}", id, section.body));
            result.sections.push(section);
        }

        result.answer = answer.join("\n\n");
        result.references = retrieval.identifiers.clone();
        Ok(result)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        match tokio::time::timeout(self.timeout, self.model.generate(request)).await {
            Ok(Ok(generation)) => Ok(generation),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::GenerationFailure(format!(
                "generation timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

/// Trim chunk text to the snippet budget and drop a candidate's duplicate
/// snippets, keeping order
fn prepare_grounding<'a>(
    chunks: impl Iterator<Item = &'a PassageChunk>,
    budget: usize,
) -> Vec<PassageChunk> {
    let mut prepared: Vec<PassageChunk> = Vec::new();
    for chunk in chunks {
        let snippet = prompt::make_snippet(&chunk.text, budget);
        if snippet.is_empty() {
            continue;
        }
        let duplicate = prepared
            .iter()
            .any(|p| p.candidate_id == chunk.candidate_id && p.text == snippet);
        if !duplicate {
            prepared.push(PassageChunk {
                text: snippet,
                ..chunk.clone()
            });
        }
    }
    prepared
}
