//! ResumeChat - Conversational resume search with intent routing and entity memory
//!
//! Every user turn is routed to exactly one strategy (exact-identifier
//! lookup, ranked semantic search, multi-candidate comparison or general
//! chat), retrieval is resolved against a vector index, and a per-session
//! entity memory keeps track of which candidates the conversation refers to
//! ("the first one", "compare them").
//!
//! ## Architecture
//!
//! ```text
//! turn text
//!     │
//!     ▼
//! ┌──────────────┐   reads    ┌───────────────┐
//! │ IntentRouter │◄───────────│ EntityMemory  │◄──────────┐
//! └──────┬───────┘            └───────────────┘           │ commit
//!        │ RoutingDecision                                │
//!        ▼                                                │
//! ┌─────────────────────┐     ┌──────────────────┐        │
//! │ RetrievalDispatcher │────►│ ResponseComposer │────────┘
//! └─────────┬───────────┘     └────────┬─────────┘
//!           │                          │
//!   VectorIndex + EmbeddingService   LanguageModel
//! ```
//!
//! ## Modules
//!
//! - [`routing`]: Intent router, reference resolution and classifiers
//! - [`retrieval`]: Vector index interface and the retrieval dispatcher
//! - [`memory`]: Bounded per-session entity memory
//! - [`compose`]: Answer composition and the memory commit
//! - [`session`]: Sessions and the per-turn orchestrator
//! - [`providers`]: Embedding and language model clients
//! - [`usage`]: Observational usage events
//! - [`api`]: HTTP API
//! - [`config`]: Configuration management

pub mod api;
pub mod compose;
pub mod config;
pub mod error;
pub mod memory;
pub mod providers;
pub mod retrieval;
pub mod routing;
pub mod session;
pub mod usage;

pub use config::ResumeChatConfig;
pub use error::{Error, Result};
pub use session::Orchestrator;
