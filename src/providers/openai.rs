//! OpenAI-compatible embedding and chat completion client

use super::{
    EmbeddingService, Generation, GenerationRequest, LanguageModel, ModelProfile, RetryPolicy,
    TokenUsage,
};
use crate::config::ModelsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for `/embeddings` and `/chat/completions`
pub struct OpenAiClient {
    client: reqwest::Client,
    config: ModelsConfig,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Create a client. `api_key` is optional so local compatible servers work.
    pub fn new(config: ModelsConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.generation_timeout_secs.max(1)))
            .build()?;
        let retry = RetryPolicy::new(config.max_retries, config.retry_base_ms);

        Ok(Self {
            client,
            config,
            api_key,
            retry,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post<B: Serialize>(&self, url: &str, body: &B) -> reqwest::RequestBuilder {
        let builder = self.client.post(url).json(body);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Model name and temperature for a profile
    fn model_for(&self, profile: ModelProfile) -> (&str, f32) {
        match profile {
            ModelProfile::Supervisor => (self.config.supervisor_model.as_str(), 0.0),
            ModelProfile::Rag => (self.config.rag_model.as_str(), self.config.rag_temperature),
            ModelProfile::Chat => (self.config.chat_model.as_str(), self.config.chat_temperature),
        }
    }

    fn chat_body<'a>(&'a self, request: &GenerationRequest) -> ChatCompletionRequest<'a> {
        let (model, temperature) = self.model_for(request.profile);
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: request.system_prompt.clone(),
        });
        messages.extend(request.history.iter().map(|turn| ChatMessage {
            role: turn.role.as_str(),
            content: turn.content.clone(),
        }));
        messages.push(ChatMessage {
            role: "user",
            content: request.user_message(),
        });
        ChatCompletionRequest {
            model,
            temperature,
            messages,
        }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.endpoint("embeddings");
        let body = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: text,
        };

        let response = self
            .retry
            .send("Embedding request", || self.post(&url, &body))
            .await
            .map_err(Error::RetrievalUnavailable)?;

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            Error::RetrievalUnavailable(format!("Failed to parse embedding response: {}", e))
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::RetrievalUnavailable("Embedding response had no data".to_string()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let url = self.endpoint("chat/completions");
        let body = self.chat_body(request);

        let response = self
            .retry
            .send("Chat completion", || self.post(&url, &body))
            .await
            .map_err(Error::GenerationFailure)?;

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::GenerationFailure(format!("Failed to parse chat completion: {}", e))
        })?;

        parse_generation(parsed)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn parse_generation(response: ChatCompletionResponse) -> Result<Generation> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::GenerationFailure("Chat completion returned no content".to_string()))?;

    Ok(Generation {
        text,
        usage: response.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}
