//! Qdrant vector index over the REST API
//!
//! Expects the collection layout produced by the ingestion pipeline: one
//! point per chunk, point id = insertion order, payload fields `resume_id`
//! (integer, indexed), `category`, `chunk_index` and `chunk_text`.

use super::index::VectorIndex;
use super::types::{CandidateId, PassageChunk};
use crate::error::{Error, Result};
use crate::providers::RetryPolicy;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Qdrant-backed [`VectorIndex`]
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    scroll_limit: usize,
    retry: RetryPolicy,
}

impl QdrantIndex {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
        scroll_limit: usize,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key,
            scroll_limit: scroll_limit.max(1),
            retry: RetryPolicy::new(max_retries, 1000),
        })
    }

    fn points_url(&self, action: &str) -> String {
        format!(
            "{}/collections/{}/points/{}",
            self.base_url, self.collection, action
        )
    }

    fn post(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        let builder = self.client.post(url).json(body);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn call<R: serde::de::DeserializeOwned>(&self, action: &str, body: Value) -> Result<R> {
        let url = self.points_url(action);
        let what = format!("Qdrant {}", action);
        let response = self
            .retry
            .send(&what, || self.post(&url, &body))
            .await
            .map_err(|e| Error::RetrievalUnavailable(format!("{}: {}", what, e)))?;

        let envelope: QdrantResponse<R> = response.json().await.map_err(|e| {
            Error::RetrievalUnavailable(format!("Failed to parse {} response: {}", what, e))
        })?;
        Ok(envelope.result)
    }
}

/// Payload filter value for an identifier: integer when numeric
fn identifier_match_value(id: &CandidateId) -> Value {
    match id.as_str().parse::<i64>() {
        Ok(n) => json!(n),
        Err(_) => json!(id.as_str()),
    }
}

fn scroll_body(id: &CandidateId, limit: usize) -> Value {
    json!({
        "filter": {
            "must": [
                { "key": "resume_id", "match": { "value": identifier_match_value(id) } }
            ]
        },
        "limit": limit,
        "with_payload": true,
        "with_vector": false,
    })
}

fn search_body(embedding: &[f32], k: usize) -> Value {
    json!({
        "vector": embedding,
        "limit": k,
        "with_payload": true,
    })
}

/// Convert a Qdrant point into a chunk. Points without a payload id are skipped.
fn point_to_chunk(point: QdrantPoint, fallback_seq: u64) -> Option<PassageChunk> {
    let payload = point.payload.unwrap_or_default();
    let candidate_id = match payload.get("resume_id")? {
        Value::String(s) => CandidateId::new(s.clone()),
        Value::Null => return None,
        other => CandidateId::new(other.to_string()),
    };

    Some(PassageChunk {
        candidate_id,
        chunk_index: payload
            .get("chunk_index")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        seq: point.id.as_u64().unwrap_or(fallback_seq),
        text: payload
            .get("chunk_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        category: payload
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        score: point.score,
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn fetch_by_identifier(&self, id: &CandidateId) -> Result<Vec<PassageChunk>> {
        let result: ScrollResult = self
            .call("scroll", scroll_body(id, self.scroll_limit))
            .await?;

        Ok(result
            .points
            .into_iter()
            .enumerate()
            .filter_map(|(i, p)| point_to_chunk(p, i as u64))
            .map(|mut c| {
                c.score = None;
                c
            })
            .collect())
    }

    async fn search_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<PassageChunk>> {
        let points: Vec<QdrantPoint> = self.call("search", search_body(embedding, k)).await?;
        Ok(points
            .into_iter()
            .enumerate()
            .filter_map(|(i, p)| point_to_chunk(p, i as u64))
            .collect())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct QdrantResponse<R> {
    result: R,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<QdrantPoint>,
}

#[derive(Debug, Deserialize)]
struct QdrantPoint {
    id: Value,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    payload: Option<serde_json::Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_body_uses_integer_ids() {
        let body = scroll_body(&CandidateId::from("57667857"), 64);
        assert_eq!(body["filter"]["must"][0]["key"], "resume_id");
        assert_eq!(body["filter"]["must"][0]["match"]["value"], 57667857);
        assert_eq!(body["limit"], 64);

        let body = scroll_body(&CandidateId::from("cand-7"), 64);
        assert_eq!(body["filter"]["must"][0]["match"]["value"], "cand-7");
    }

    #[test]
    fn test_search_body() {
        let body = search_body(&[0.5, 0.25], 5);
        assert_eq!(body["limit"], 5);
        assert_eq!(body["vector"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_point_to_chunk() {
        let point: QdrantPoint = serde_json::from_value(json!({
            "id": 42,
            "score": 0.87,
            "payload": {
                "resume_id": 11847784,
                "category": "ENGINEERING",
                "chunk_index": 2,
                "chunk_text": "embedded systems engineer"
            }
        }))
        .unwrap();

        let chunk = point_to_chunk(point, 0).unwrap();
        assert_eq!(chunk.candidate_id.as_str(), "11847784");
        assert_eq!(chunk.seq, 42);
        assert_eq!(chunk.chunk_index, 2);
        assert_eq!(chunk.category, "ENGINEERING");
        assert!((chunk.score.unwrap() - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_point_without_resume_id_is_skipped() {
        let point: QdrantPoint = serde_json::from_value(json!({
            "id": "5c56c793-69f3-4fbf-87e6-c4bf54c28c26",
            "payload": { "chunk_text": "orphan" }
        }))
        .unwrap();
        assert!(point_to_chunk(point, 3).is_none());
    }

    #[test]
    fn test_points_url() {
        let index = QdrantIndex::new(
            "http://localhost:6333/",
            "resume_chunks",
            None,
            256,
            3,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            index.points_url("scroll"),
            "http://localhost:6333/collections/resume_chunks/points/scroll"
        );
    }
}
