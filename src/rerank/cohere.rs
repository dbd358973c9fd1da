//! Cohere rerank endpoint client

use super::{apply_ranking, RerankError, Reranker};
use crate::index::ScoredNode;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_COHERE_BASE_URL: &str = "https://api.cohere.ai";

pub struct CohereRerank {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

impl CohereRerank {
    pub fn new(
        model: &str,
        api_key: &str,
        top_n: usize,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, RerankError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_COHERE_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            top_n,
        })
    }
}

#[async_trait]
impl Reranker for CohereRerank {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredNode>,
    ) -> Result<Vec<ScoredNode>, RerankError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        if query.is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let documents: Vec<&str> = candidates.iter().map(|c| c.node.text.as_str()).collect();
        let body = serde_json::json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": self.top_n,
        });

        let resp = self
            .client
            .post(format!("{}/v1/rerank", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RerankError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RerankResponse = resp.json().await?;
        let ranking = parsed
            .results
            .into_iter()
            .map(|r| (r.index, r.relevance_score))
            .collect();

        apply_ranking(candidates, ranking, self.top_n)
    }

    fn top_n(&self) -> usize {
        self.top_n
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
