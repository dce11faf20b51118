//! Rolling window of the conversation's recent messages
//!
//! Fed to intent classification and general chat so follow-ups like "and
//! tomorrow?" keep their context. Grounded answers never see it.

use crate::providers::ChatTurn;
use std::collections::VecDeque;

/// Default number of messages kept, user and assistant combined.
pub const DEFAULT_HISTORY_MESSAGES: usize = 10;

/// Bounded message history, oldest first
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: VecDeque<ChatTurn>,
    max_messages: usize,
}

impl ConversationHistory {
    /// A zero limit disables the history.
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(max_messages.min(64)),
            max_messages,
        }
    }

    /// Append one user message and the answer it got
    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.push(ChatTurn::user(user));
        self.push(ChatTurn::assistant(assistant));
    }

    pub fn push(&mut self, turn: ChatTurn) {
        if self.max_messages == 0 {
            return;
        }
        while self.messages.len() >= self.max_messages {
            self.messages.pop_front();
        }
        self.messages.push_back(turn);
    }

    /// Messages oldest first
    pub fn messages(&self) -> Vec<ChatTurn> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_MESSAGES)
    }
}
