//! Conversation entity memory and message history

mod entity;
mod history;

pub use entity::{EntityMemory, MemorySnapshot, DEFAULT_CAPACITY, DEFAULT_WINDOW_TURNS};
pub use history::{ConversationHistory, DEFAULT_HISTORY_MESSAGES};
