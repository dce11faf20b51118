//! Vector index interface and the in-process implementation
//!
//! The in-process index keeps embedded chunks in insertion order and scores
//! them with cosine similarity. It can be seeded from a JSON Lines snapshot
//! with one embedded chunk per line:
//!
//! ```text
//! {"resume_id": 57667857, "category": "HR", "chunk_index": 0, "chunk_text": "...", "vector": [0.1, ...]}
//! ```

use super::types::{CandidateId, PassageChunk};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::sync::RwLock;

/// Vector index collaborator
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// All chunks owned by one identifier. Order is unspecified.
    async fn fetch_by_identifier(&self, id: &CandidateId) -> Result<Vec<PassageChunk>>;

    /// The `k` chunks nearest to `embedding`, each carrying its score
    async fn search_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<PassageChunk>>;

    fn name(&self) -> &str;
}

struct IndexedChunk {
    chunk: PassageChunk,
    vector: Vec<f32>,
    norm: f32,
}

/// In-process vector index with cosine scoring
pub struct InMemoryIndex {
    chunks: RwLock<Vec<IndexedChunk>>,
}

/// One line of a JSON Lines snapshot
#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    resume_id: serde_json::Value,
    #[serde(default)]
    category: String,
    chunk_index: u32,
    chunk_text: String,
    vector: Vec<f32>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Load a JSON Lines snapshot. Blank lines are skipped.
    pub async fn load_snapshot(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let index = Self::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: SnapshotRecord = serde_json::from_str(line).map_err(|e| {
                Error::Config(format!(
                    "Invalid snapshot record at {}:{}: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            let id = match record.resume_id {
                serde_json::Value::String(s) => CandidateId::new(s),
                other => CandidateId::new(other.to_string()),
            };
            index
                .insert(id, record.category, record.chunk_index, record.chunk_text, record.vector)
                .await;
        }

        tracing::info!(
            "Loaded {} chunks from snapshot {}",
            index.len().await,
            path.display()
        );
        Ok(index)
    }

    /// Append one embedded chunk, returning its insertion sequence number
    pub async fn insert(
        &self,
        candidate_id: CandidateId,
        category: impl Into<String>,
        chunk_index: u32,
        text: impl Into<String>,
        vector: Vec<f32>,
    ) -> u64 {
        let mut chunks = self.chunks.write().await;
        let seq = chunks.len() as u64;
        let norm = l2_norm(&vector);
        chunks.push(IndexedChunk {
            chunk: PassageChunk {
                candidate_id,
                chunk_index,
                seq,
                text: text.into(),
                category: category.into(),
                score: None,
            },
            vector,
            norm,
        });
        seq
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn fetch_by_identifier(&self, id: &CandidateId) -> Result<Vec<PassageChunk>> {
        let chunks = self.chunks.read().await;
        Ok(chunks
            .iter()
            .filter(|c| &c.chunk.candidate_id == id)
            .map(|c| c.chunk.clone())
            .collect())
    }

    async fn search_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<PassageChunk>> {
        let query_norm = l2_norm(embedding);
        let chunks = self.chunks.read().await;

        let mut scored: Vec<PassageChunk> = chunks
            .iter()
            .filter(|c| c.vector.len() == embedding.len())
            .map(|c| {
                let mut chunk = c.chunk.clone();
                chunk.score = Some(cosine(embedding, query_norm, &c.vector, c.norm));
                chunk
            })
            .collect();

        scored.sort_by(|a, b| {
            let sa = a.score.unwrap_or(f32::NEG_INFINITY);
            let sb = b.score.unwrap_or(f32::NEG_INFINITY);
            sb.total_cmp(&sa).then(a.seq.cmp(&b.seq))
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn seeded() -> InMemoryIndex {
        let index = InMemoryIndex::new();
        index
            .insert("101".into(), "IT", 0, "python backend", vec![1.0, 0.0])
            .await;
        index
            .insert("101".into(), "IT", 1, "django apis", vec![0.9, 0.1])
            .await;
        index
            .insert("205".into(), "HR", 0, "recruiting", vec![0.0, 1.0])
            .await;
        index
    }

    #[tokio::test]
    async fn test_fetch_by_identifier() {
        let index = seeded().await;
        let chunks = index.fetch_by_identifier(&"101".into()).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.score.is_none()));

        let none = index.fetch_by_identifier(&"999".into()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_search_similar_ranks_by_cosine() {
        let index = seeded().await;
        let results = index.search_similar(&[1.0, 0.0], 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "python backend");
        assert!((results[0].score.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(results[1].text, "django apis");
    }

    #[tokio::test]
    async fn test_search_ties_keep_insertion_order() {
        let index = InMemoryIndex::new();
        for id in ["c", "a", "b"] {
            index.insert(id.into(), "IT", 0, id, vec![1.0, 1.0]).await;
        }
        let results = index.search_similar(&[1.0, 1.0], 3).await.unwrap();
        let order: Vec<&str> = results.iter().map(|c| c.candidate_id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_search_skips_dimension_mismatch() {
        let index = seeded().await;
        index.insert("x".into(), "IT", 0, "odd", vec![1.0]).await;
        let results = index.search_similar(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_load_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"resume_id": 57667857, "category": "HR", "chunk_index": 0, "chunk_text": "hr lead", "vector": [0.5, 0.5]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"resume_id": "abc", "chunk_index": 1, "chunk_text": "other", "vector": [1.0, 0.0]}}"#
        )
        .unwrap();

        let index = InMemoryIndex::load_snapshot(file.path()).await.unwrap();
        assert_eq!(index.len().await, 2);
        let chunks = index
            .fetch_by_identifier(&CandidateId::from("57667857"))
            .await
            .unwrap();
        assert_eq!(chunks[0].category, "HR");
        assert_eq!(chunks[0].seq, 0);
    }

    #[tokio::test]
    async fn test_load_snapshot_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        let err = InMemoryIndex::load_snapshot(file.path()).await.err().unwrap();
        assert!(err.to_string().contains(":1"));
    }
}
