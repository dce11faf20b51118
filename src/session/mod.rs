//! Sessions and the per-turn orchestrator

mod manager;
mod orchestrator;

pub use manager::{Session, SessionManager, SessionSnapshot};
pub use orchestrator::Orchestrator;
