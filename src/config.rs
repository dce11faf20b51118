//! ResumeChat configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main ResumeChat configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeChatConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Intent router configuration
    pub router: RouterConfig,

    /// Retrieval dispatcher configuration
    pub retrieval: RetrievalConfig,

    /// Entity memory configuration
    pub memory: MemoryConfig,

    /// Vector index configuration
    pub index: IndexConfig,

    /// Model provider configuration
    pub models: ModelsConfig,

    /// Session lifecycle configuration
    pub sessions: SessionsConfig,
}

impl ResumeChatConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.exact_limit == 0 || r.semantic_top_k == 0 || r.per_candidate_limit == 0 {
            return Err(Error::Config(
                "retrieval limits must be greater than zero".to_string(),
            ));
        }
        if r.max_total_chunks == 0 {
            return Err(Error::Config(
                "retrieval.max_total_chunks must be greater than zero".to_string(),
            ));
        }
        if r.per_candidate_cap == Some(0) {
            return Err(Error::Config(
                "retrieval.per_candidate_cap must be unset or greater than zero".to_string(),
            ));
        }
        if self.memory.window_turns == 0 || self.memory.capacity == 0 {
            return Err(Error::Config(
                "memory.window_turns and memory.capacity must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.router.min_chat_confidence) {
            return Err(Error::Config(
                "router.min_chat_confidence must be within 0.0..=1.0".to_string(),
            ));
        }
        regex::Regex::new(&self.router.identifier_pattern).map_err(|e| {
            Error::Config(format!(
                "Invalid router.identifier_pattern '{}': {}",
                self.router.identifier_pattern, e
            ))
        })?;
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins (empty = any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18791,
            cors_origins: Vec::new(),
        }
    }
}

/// Which intent classifier the router uses for turns without identifiers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// Rule-based keyword classifier (no network)
    #[default]
    Keyword,
    /// Supervisor prompt against the chat model
    Llm,
}

/// Intent router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Regex matching identifier tokens in user text
    pub identifier_pattern: String,

    /// Minimum classifier confidence needed to route a turn to general chat
    pub min_chat_confidence: f64,

    /// Classifier backend
    pub classifier: ClassifierBackend,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            identifier_pattern: r"\b\d{5,}\b".to_string(),
            min_chat_confidence: 0.5,
            classifier: ClassifierBackend::Keyword,
        }
    }
}

/// Retrieval dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunk cap for a single-identifier lookup
    pub exact_limit: usize,

    /// Nearest neighbours returned by semantic search
    pub semantic_top_k: usize,

    /// Chunk cap per identifier in comparison mode
    pub per_candidate_limit: usize,

    /// Optional cap on chunks of one candidate in semantic results
    pub per_candidate_cap: Option<usize>,

    /// Over-fetch factor applied to top-k when a per-candidate cap is set
    pub oversample: usize,

    /// Ceiling on chunks returned by any mode
    pub max_total_chunks: usize,

    /// Timeout for one index or embedding call, in seconds
    pub call_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            exact_limit: 5,
            semantic_top_k: 5,
            per_candidate_limit: 5,
            per_candidate_cap: None,
            oversample: 4,
            max_total_chunks: 25,
            call_timeout_secs: 30,
        }
    }
}

/// Entity memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Identifiers surfaced more than this many committed turns ago are forgotten
    pub window_turns: usize,

    /// Hard limit on remembered identifiers
    pub capacity: usize,

    /// Recent messages (user and assistant) passed to classification and
    /// general chat; 0 disables the history
    pub history_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window_turns: 10,
            capacity: 50,
            history_messages: 10,
        }
    }
}

/// Vector index backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum IndexConfig {
    /// In-process index, optionally loaded from a JSON Lines snapshot
    Memory {
        /// Snapshot of embedded chunks
        #[serde(default)]
        snapshot: Option<PathBuf>,
    },
    /// Qdrant collection over its REST API
    Qdrant {
        /// Base URL, e.g. `http://localhost:6333`
        url: String,
        /// Collection name
        #[serde(default = "default_collection")]
        collection: String,
        /// Environment variable holding the API key
        #[serde(default = "default_qdrant_key_ref")]
        api_key_ref: String,
        /// Maximum points fetched for one identifier
        #[serde(default = "default_scroll_limit")]
        scroll_limit: usize,
        /// Retries per request
        #[serde(default = "default_max_retries")]
        max_retries: u32,
    },
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig::Memory { snapshot: None }
    }
}

fn default_collection() -> String {
    "resume_chunks".to_string()
}

fn default_qdrant_key_ref() -> String {
    "qdrant_api_key".to_string()
}

fn default_scroll_limit() -> usize {
    256
}

fn default_max_retries() -> u32 {
    3
}

/// Model provider configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// API base URL
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_ref: String,

    /// Embedding model
    pub embedding_model: String,

    /// Model used for intent classification
    pub supervisor_model: String,

    /// Model used for grounded answers
    pub rag_model: String,

    /// Model used for general chat
    pub chat_model: String,

    /// Sampling temperature for grounded answers
    pub rag_temperature: f32,

    /// Sampling temperature for general chat
    pub chat_temperature: f32,

    /// Retries per request
    pub max_retries: u32,

    /// Base delay between retries in milliseconds (doubled per attempt)
    pub retry_base_ms: u64,

    /// Timeout for one generation call, in seconds
    pub generation_timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_ref: "openai_api_key".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            supervisor_model: "gpt-4.1-mini".to_string(),
            rag_model: "gpt-4.1-mini".to_string(),
            chat_model: "gpt-4.1-mini".to_string(),
            rag_temperature: 0.2,
            chat_temperature: 0.7,
            max_retries: 3,
            retry_base_ms: 500,
            generation_timeout_secs: 60,
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Sessions idle longer than this are dropped, in seconds
    pub idle_timeout_secs: u64,

    /// How often idle sessions are swept, in seconds
    pub cleanup_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            cleanup_interval_secs: 300,
        }
    }
}

/// Resolve a secret from the environment variable named by `key_ref`.
///
/// Tries the exact name first, then its UPPER_CASE form
/// (`"openai_api_key"` → `$OPENAI_API_KEY`).
pub fn resolve_secret(key_ref: &str) -> Option<String> {
    std::env::var(key_ref)
        .or_else(|_| std::env::var(key_ref.to_uppercase()))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Resolve every secret the configuration refers to, keyed by reference name
pub fn resolve_secrets_from_env(config: &ResumeChatConfig) -> HashMap<String, String> {
    let mut refs = vec![config.models.api_key_ref.clone()];
    if let IndexConfig::Qdrant { api_key_ref, .. } = &config.index {
        refs.push(api_key_ref.clone());
    }

    let mut keys = HashMap::new();
    for key_ref in refs {
        if let Some(value) = resolve_secret(&key_ref) {
            keys.insert(key_ref, value);
        }
    }
    keys
}
