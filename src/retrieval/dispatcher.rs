//! Retrieval dispatcher
//!
//! Executes the retrieval mode chosen by the router against the vector index
//! and embedding service, and enforces the per-mode limits and the global
//! chunk ceiling.

use super::index::VectorIndex;
use super::types::{CandidateId, PassageChunk, RetrievalMode, RetrievalResult};
use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingService;
use crate::routing::RoutingDecision;
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Runs ExactId, Semantic and Comparison retrieval
pub struct RetrievalDispatcher {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingService>,
    config: RetrievalConfig,
    call_timeout: Duration,
}

impl RetrievalDispatcher {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingService>,
        config: RetrievalConfig,
    ) -> Self {
        let call_timeout = Duration::from_secs(config.call_timeout_secs.max(1));
        Self {
            index,
            embedder,
            config,
            call_timeout,
        }
    }

    /// Override the per-call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Execute a routing decision.
    ///
    /// Returns `None` for general chat, which needs no retrieval.
    pub async fn dispatch(&self, decision: &RoutingDecision) -> Result<Option<RetrievalResult>> {
        let RoutingDecision::Retrieve {
            mode,
            identifiers,
            query,
        } = decision
        else {
            return Ok(None);
        };

        let result = match mode {
            RetrievalMode::ExactId => match identifiers.first() {
                Some(id) => self.exact_id(id).await?,
                None => self.semantic(query).await?,
            },
            RetrievalMode::Semantic => self.semantic(query).await?,
            RetrievalMode::Comparison => self.comparison(identifiers).await?,
        };

        tracing::debug!(
            mode = %result.mode,
            chunks = result.chunks.len(),
            identifiers = result.identifiers.len(),
            "Retrieval complete"
        );
        Ok(Some(result))
    }

    /// All chunks of one identifier in document order, capped at `exact_limit`
    pub async fn exact_id(&self, id: &CandidateId) -> Result<RetrievalResult> {
        let chunks = self.fetch_ordered(id, self.config.exact_limit).await?;
        let identifiers = vec![id.clone()];
        let chunks = truncate_grouped(chunks, &identifiers, self.config.max_total_chunks);

        Ok(RetrievalResult {
            mode: RetrievalMode::ExactId,
            chunks,
            identifiers,
        })
    }

    /// Nearest chunks to the query, best first
    pub async fn semantic(&self, query: &str) -> Result<RetrievalResult> {
        let embedding = self
            .bounded("embedding", self.embedder.embed(query))
            .await?;

        let top_k = self.config.semantic_top_k;
        let k = match self.config.per_candidate_cap {
            Some(_) => top_k.saturating_mul(self.config.oversample.max(1)),
            None => top_k,
        };

        let mut chunks = self
            .bounded("similarity search", self.index.search_similar(&embedding, k))
            .await?;
        sort_by_score(&mut chunks);

        if let Some(cap) = self.config.per_candidate_cap {
            chunks = cap_per_candidate(chunks, cap);
        }
        chunks.truncate(top_k.min(self.config.max_total_chunks));

        let mut identifiers: Vec<CandidateId> = Vec::new();
        for chunk in &chunks {
            if !identifiers.contains(&chunk.candidate_id) {
                identifiers.push(chunk.candidate_id.clone());
            }
        }

        Ok(RetrievalResult {
            mode: RetrievalMode::Semantic,
            chunks,
            identifiers,
        })
    }

    /// Per-identifier lookups, fetched concurrently and grouped in input order
    pub async fn comparison(&self, identifiers: &[CandidateId]) -> Result<RetrievalResult> {
        let limit = self.config.per_candidate_limit;
        let fetches = identifiers.iter().map(|id| self.fetch_ordered(id, limit));
        let results = join_all(fetches).await;

        let mut chunks = Vec::new();
        for (id, result) in identifiers.iter().zip(results) {
            let group = result?;
            if group.is_empty() {
                tracing::debug!("No chunks for identifier {}", id);
            }
            chunks.extend(group);
        }

        let identifiers = identifiers.to_vec();
        let chunks = truncate_grouped(chunks, &identifiers, self.config.max_total_chunks);

        Ok(RetrievalResult {
            mode: RetrievalMode::Comparison,
            chunks,
            identifiers,
        })
    }

    async fn fetch_ordered(&self, id: &CandidateId, limit: usize) -> Result<Vec<PassageChunk>> {
        let mut chunks = self
            .bounded("identifier lookup", self.index.fetch_by_identifier(id))
            .await?;
        chunks.retain(|c| &c.candidate_id == id);
        chunks.sort_by(|a, b| a.chunk_index.cmp(&b.chunk_index).then(a.seq.cmp(&b.seq)));
        chunks.truncate(limit);
        Ok(chunks)
    }

    /// Apply the call timeout and map every failure to `RetrievalUnavailable`
    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_retrieval_unavailable() => Err(e),
            Ok(Err(e)) => Err(Error::RetrievalUnavailable(format!("{} failed: {}", what, e))),
            Err(_) => Err(Error::RetrievalUnavailable(format!(
                "{} timed out after {:?}",
                what, self.call_timeout
            ))),
        }
    }
}

/// Descending score, ties by ascending insertion order
fn sort_by_score(chunks: &mut [PassageChunk]) {
    chunks.sort_by(|a, b| {
        let sa = a.score.unwrap_or(f32::NEG_INFINITY);
        let sb = b.score.unwrap_or(f32::NEG_INFINITY);
        sb.total_cmp(&sa).then(a.seq.cmp(&b.seq))
    });
}

fn cap_per_candidate(chunks: Vec<PassageChunk>, cap: usize) -> Vec<PassageChunk> {
    let mut counts: HashMap<CandidateId, usize> = HashMap::new();
    chunks
        .into_iter()
        .filter(|c| {
            let n = counts.entry(c.candidate_id.clone()).or_insert(0);
            *n += 1;
            *n <= cap
        })
        .collect()
}

/// Enforce the ceiling on grouped results.
///
/// Drops the largest `chunk_index` first; on ties the later identifier group
/// loses. Survivors keep their original order.
fn truncate_grouped(
    chunks: Vec<PassageChunk>,
    identifiers: &[CandidateId],
    max: usize,
) -> Vec<PassageChunk> {
    if chunks.len() <= max {
        return chunks;
    }

    let group_of = |c: &PassageChunk| {
        identifiers
            .iter()
            .position(|id| id == &c.candidate_id)
            .unwrap_or(identifiers.len())
    };

    let mut priority: Vec<usize> = (0..chunks.len()).collect();
    priority.sort_by_key(|&i| (chunks[i].chunk_index, group_of(&chunks[i]), i));
    let mut keep = vec![false; chunks.len()];
    for &i in priority.iter().take(max) {
        keep[i] = true;
    }

    tracing::debug!(
        "Truncated {} chunks to the ceiling of {}",
        chunks.len(),
        max
    );

    chunks
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect()
}
