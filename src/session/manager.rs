//! Session management

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::memory::{ConversationHistory, EntityMemory, MemorySnapshot};
use crate::providers::{ChatTurn, TokenUsage};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Longest accepted session id
const MAX_SESSION_ID_LEN: usize = 128;

/// One conversation
#[derive(Debug)]
pub struct Session {
    /// Session ID
    pub id: String,
    /// Creation timestamp
    pub created_at: i64,
    /// Entity memory, locked for the whole of a turn
    memory: Mutex<EntityMemory>,
    /// Recent messages for classification and general chat
    history: Mutex<ConversationHistory>,
    /// Last activity timestamp
    last_activity: RwLock<i64>,
    /// Completed turns
    turn_count: RwLock<u64>,
    /// Tokens spent across turns
    usage: RwLock<TokenUsage>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub created_at: i64,
    pub last_activity: i64,
    pub turn_count: u64,
    pub usage: TokenUsage,
    pub memory: MemorySnapshot,
    pub history: Vec<ChatTurn>,
}

impl Session {
    /// Create a new session
    pub fn new(id: impl Into<String>, memory: EntityMemory, history: ConversationHistory) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            created_at: now,
            memory: Mutex::new(memory),
            history: Mutex::new(history),
            last_activity: RwLock::new(now),
            turn_count: RwLock::new(0),
            usage: RwLock::new(TokenUsage::default()),
        }
    }

    /// Lock the entity memory. Held for a whole turn, which serialises the
    /// turns of one session.
    pub async fn lock_memory(&self) -> MutexGuard<'_, EntityMemory> {
        self.memory.lock().await
    }

    /// Whether a turn currently holds the memory
    pub fn is_busy(&self) -> bool {
        self.memory.try_lock().is_err()
    }

    /// Recent messages, oldest first
    pub async fn history(&self) -> Vec<ChatTurn> {
        self.history.lock().await.messages()
    }

    /// Remember one user message and the answer it got
    pub async fn record_exchange(&self, user: &str, assistant: &str) {
        self.history.lock().await.record_exchange(user, assistant);
    }

    /// Update last activity
    pub async fn touch(&self) {
        *self.last_activity.write().await = chrono::Utc::now().timestamp_millis();
    }

    /// Get last activity timestamp
    pub async fn last_activity(&self) -> i64 {
        *self.last_activity.read().await
    }

    /// Count a completed turn and its tokens
    pub async fn record_turn(&self, usage: &TokenUsage) {
        *self.turn_count.write().await += 1;
        self.usage.write().await.add(usage);
        self.touch().await;
    }

    /// Get turn count
    pub async fn turn_count(&self) -> u64 {
        *self.turn_count.read().await
    }

    /// Get cumulative token usage
    pub async fn usage(&self) -> TokenUsage {
        *self.usage.read().await
    }

    /// Forget every remembered candidate and message, and reset the counters
    pub async fn reset(&self) {
        self.lock_memory().await.clear();
        self.history.lock().await.clear();
        *self.turn_count.write().await = 0;
        *self.usage.write().await = TokenUsage::default();
        self.touch().await;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let memory = self.lock_memory().await.snapshot();
        SessionSnapshot {
            id: self.id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity().await,
            turn_count: self.turn_count().await,
            usage: self.usage().await,
            memory,
            history: self.history().await,
        }
    }
}

/// Session manager
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    memory_config: MemoryConfig,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(memory_config: MemoryConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            memory_config,
        }
    }

    /// Get the session with this id, creating it on first use.
    ///
    /// Counts as activity, so the idle sweep cannot take a session a turn
    /// is about to use.
    pub async fn get_or_create(&self, session_id: &str) -> Result<Arc<Session>> {
        validate_session_id(session_id)?;

        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                session.touch().await;
                return Ok(session.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another turn may have created it between the two locks
        if let Some(session) = sessions.get(session_id) {
            session.touch().await;
            return Ok(session.clone());
        }

        let session = Arc::new(Session::new(
            session_id,
            EntityMemory::from_config(&self.memory_config),
            ConversationHistory::new(self.memory_config.history_messages),
        ));
        sessions.insert(session_id.to_string(), session.clone());

        tracing::info!("Created session {}", session_id);
        Ok(session)
    }

    /// Get session by ID
    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Reset a session's memory. Returns false when the session is unknown.
    pub async fn reset(&self, session_id: &str) -> bool {
        match self.get(session_id).await {
            Some(session) => {
                session.reset().await;
                tracing::info!("Reset session {}", session_id);
                true
            }
            None => false,
        }
    }

    /// IDs of all sessions
    pub async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get session count
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Clean up sessions idle for longer than `max_idle_ms`.
    ///
    /// Sessions with a turn in flight are kept whatever their idle time.
    pub async fn cleanup_inactive(&self, max_idle_ms: i64) -> usize {
        let now = chrono::Utc::now().timestamp_millis();
        let mut sessions = self.sessions.write().await;

        let mut idle = Vec::new();
        for (id, session) in sessions.iter() {
            let idle_time = now - session.last_activity().await;
            if idle_time > max_idle_ms && !session.is_busy() {
                idle.push(id.clone());
            }
        }

        for id in &idle {
            sessions.remove(id);
            tracing::debug!("Removed idle session {}", id);
        }

        let cleaned = idle.len();
        if cleaned > 0 {
            tracing::info!("Cleaned up {} inactive sessions", cleaned);
        }

        cleaned
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty() {
        return Err(Error::Session("session id must not be empty".to_string()));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(Error::Session(format!(
            "session id longer than {} bytes",
            MAX_SESSION_ID_LEN
        )));
    }
    if session_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::Session(
            "session id must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}
