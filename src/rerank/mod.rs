//! Reranking post-processors
//!
//! A reranker rescores retrieved candidates against the query and keeps only
//! the best `top_n`, fixed when the reranker is built.

mod cohere;
mod local;

pub use cohere::{CohereRerank, DEFAULT_COHERE_BASE_URL};
pub use local::FastEmbedReranker;

use crate::config::{parse_duration, Config, Credentials};
use crate::error::{DocentError, Result};
use crate::index::ScoredNode;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `candidates` by relevance to `query`, keeping at most `top_n()`
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredNode>,
    ) -> std::result::Result<Vec<ScoredNode>, RerankError>;

    fn top_n(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Reorder candidates by `(index, score)` pairs, best first, truncated to `top_n`
pub(crate) fn apply_ranking(
    candidates: Vec<ScoredNode>,
    mut ranking: Vec<(usize, f32)>,
    top_n: usize,
) -> std::result::Result<Vec<ScoredNode>, RerankError> {
    ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut slots: Vec<Option<ScoredNode>> = candidates.into_iter().map(Some).collect();
    let mut reranked = Vec::with_capacity(top_n.min(slots.len()));

    for (index, score) in ranking.into_iter().take(top_n) {
        let candidate = slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| {
                RerankError::RerankingError(format!("Ranking refers to unknown candidate {}", index))
            })?;
        reranked.push(ScoredNode::new(candidate.node, score));
    }

    Ok(reranked)
}

/// Build the reranker selected by `[rerank].provider`
pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Arc<dyn Reranker>> {
    let section = &config.rerank;
    let timeout = parse_duration(&section.timeout).unwrap_or(Duration::from_secs(30));

    let reranker: Arc<dyn Reranker> = match section.provider.as_str() {
        "cohere" => {
            let key = credentials.rerank_key(config)?;
            Arc::new(CohereRerank::new(
                &section.model,
                key,
                section.top_n,
                section.base_url.as_deref(),
                timeout,
            )?)
        }
        "fastembed" => Arc::new(FastEmbedReranker::new(&section.model, section.top_n)?),
        other => {
            return Err(DocentError::InvalidConfigValue {
                path: "rerank.provider".to_string(),
                message: format!("Unknown rerank provider '{}'", other),
            })
        }
    };

    Ok(reranker)
}
