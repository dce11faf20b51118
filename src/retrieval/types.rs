//! Core retrieval types shared by the router, dispatcher and composer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key naming one candidate's resume document.
///
/// Numeric ids from the corpus are carried as their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for CandidateId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// A bounded excerpt of one candidate's document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageChunk {
    /// Owning candidate
    pub candidate_id: CandidateId,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// Global insertion order assigned at ingestion (document, then chunk)
    pub seq: u64,
    /// Chunk text
    pub text: String,
    /// Job category label of the resume
    pub category: String,
    /// Similarity score; present only for semantic search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Retrieval strategy selected by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// All chunks of a single identifier, in document order
    ExactId,
    /// Nearest chunks to the query embedding
    Semantic,
    /// Per-identifier lookups for two or more identifiers
    Comparison,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::ExactId => write!(f, "exact_id"),
            RetrievalMode::Semantic => write!(f, "semantic"),
            RetrievalMode::Comparison => write!(f, "comparison"),
        }
    }
}

/// Output of one dispatcher call
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    /// Mode that produced the chunks
    pub mode: RetrievalMode,
    /// Ordered chunks (grouped by identifier for ExactId/Comparison)
    pub chunks: Vec<PassageChunk>,
    /// Resolved identifiers: the requested ones for ExactId/Comparison,
    /// distinct result identifiers in rank order for Semantic
    pub identifiers: Vec<CandidateId>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks belonging to one identifier, in result order
    pub fn chunks_for<'a>(
        &'a self,
        id: &'a CandidateId,
    ) -> impl Iterator<Item = &'a PassageChunk> + 'a {
        self.chunks.iter().filter(move |c| &c.candidate_id == id)
    }

    /// Chunks grouped per resolved identifier, in identifier order.
    /// Identifiers without chunks get an empty group.
    pub fn grouped(&self) -> Vec<(&CandidateId, Vec<&PassageChunk>)> {
        self.identifiers
            .iter()
            .map(|id| (id, self.chunks_for(id).collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, idx: u32) -> PassageChunk {
        PassageChunk {
            candidate_id: CandidateId::from(id),
            chunk_index: idx,
            seq: idx as u64,
            text: format!("{} chunk {}", id, idx),
            category: "ENGINEERING".to_string(),
            score: None,
        }
    }

    #[test]
    fn test_candidate_id_display_and_from() {
        assert_eq!(CandidateId::from(57667857u64).to_string(), "57667857");
        assert_eq!(CandidateId::new("abc").as_str(), "abc");
    }

    #[test]
    fn test_grouped_keeps_identifier_order_and_empty_groups() {
        let result = RetrievalResult {
            mode: RetrievalMode::Comparison,
            chunks: vec![chunk("y", 0), chunk("y", 1)],
            identifiers: vec![CandidateId::from("x"), CandidateId::from("y")],
        };

        let groups = result.grouped();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.as_str(), "x");
        assert!(groups[0].1.is_empty());
        assert_eq!(groups[1].1.len(), 2);
    }

    #[test]
    fn test_chunk_serialization_skips_missing_score() {
        let json = serde_json::to_value(chunk("a", 3)).unwrap();
        assert_eq!(json["candidateId"], "a");
        assert_eq!(json["chunkIndex"], 3);
        assert!(json.get("score").is_none());
    }
}
