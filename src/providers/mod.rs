//! Model provider interfaces
//!
//! The engine talks to embedding and text generation services only through
//! the [`EmbeddingService`] and [`LanguageModel`] traits. [`OpenAiClient`]
//! implements both against any OpenAI-compatible HTTP API.

mod http;
mod openai;

pub(crate) use http::RetryPolicy;
pub use openai::OpenAiClient;

use crate::error::Result;
use crate::retrieval::{CandidateId, PassageChunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token counts reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.input_tokens == 0 && self.output_tokens == 0
    }
}

/// Which model profile a generation call runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProfile {
    /// Intent classification, deterministic
    Supervisor,
    /// Answers grounded in retrieved resume chunks
    Rag,
    /// General conversation without retrieval
    Chat,
}

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One earlier message of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub profile: ModelProfile,
    pub system_prompt: String,
    /// Earlier messages, oldest first, sent between the system prompt and
    /// the user message. Never set for grounded answers.
    pub history: Vec<ChatTurn>,
    /// The user-facing question or instruction
    pub user_prompt: String,
    /// Chunks the answer must be grounded in; empty for chat and classification
    pub grounding: Vec<PassageChunk>,
}

impl GenerationRequest {
    pub fn new(
        profile: ModelProfile,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            profile,
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            user_prompt: user_prompt.into(),
            grounding: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: &[ChatTurn]) -> Self {
        self.history = history.to_vec();
        self
    }

    pub fn with_grounding(mut self, grounding: Vec<PassageChunk>) -> Self {
        self.grounding = grounding;
        self
    }

    /// Render the user message, appending the grounding context when present.
    ///
    /// Chunks are grouped under a `=== Resume ID <id> ===` header per
    /// candidate, in first-appearance order.
    pub fn user_message(&self) -> String {
        if self.grounding.is_empty() {
            return self.user_prompt.clone();
        }

        format!(
            "User question:\n{}\n\nHere is the resume context from the database:\n{}\n\n\
             Use ONLY this information to answer the user's question.",
            self.user_prompt,
            render_grounding(&self.grounding)
        )
    }
}

/// Format grounding chunks as per-candidate context sections
pub fn render_grounding(chunks: &[PassageChunk]) -> String {
    let mut order: Vec<&CandidateId> = Vec::new();
    for chunk in chunks {
        if !order.contains(&&chunk.candidate_id) {
            order.push(&chunk.candidate_id);
        }
    }

    let mut sections = Vec::with_capacity(order.len());
    for id in order {
        let mut lines = vec![format!("=== Resume ID {} ===", id)];
        let mut category_written = false;
        for chunk in chunks.iter().filter(|c| &c.candidate_id == id) {
            if !category_written {
                lines.push(format!("Category: {}", chunk.category));
                lines.push("Key snippets (work experience / skills / summary):".to_string());
                category_written = true;
            }
            lines.push(format!("- {}", chunk.text));
        }
        sections.push(lines.join("\n"));
    }
    sections.join("\n\n")
}

/// Generated text and the tokens it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// Text embedding service
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed one text. Deterministic for identical input within a session.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn name(&self) -> &str;
}

/// Text generation service
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;

    fn name(&self) -> &str;
}
