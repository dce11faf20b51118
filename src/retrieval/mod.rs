//! Retrieval over the resume vector index
//!
//! - [`VectorIndex`] is the index collaborator, implemented in-process by
//!   [`InMemoryIndex`] and remotely by [`QdrantIndex`]
//! - [`RetrievalDispatcher`] runs the ExactId, Semantic and Comparison modes

mod dispatcher;
mod index;
mod qdrant;
mod types;

pub use dispatcher::RetrievalDispatcher;
pub use index::{InMemoryIndex, VectorIndex};
pub use qdrant::QdrantIndex;
pub use types::{CandidateId, PassageChunk, RetrievalMode, RetrievalResult};
