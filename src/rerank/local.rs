//! Cross-encoder reranking using FastEmbed

use super::{apply_ranking, RerankError, Reranker};
use crate::index::ScoredNode;
use async_trait::async_trait;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;

/// Local cross-encoder reranker
pub struct FastEmbedReranker {
    model: Arc<TextRerank>,
    model_name: String,
    top_n: usize,
}

impl FastEmbedReranker {
    /// Create a new reranker with specified model
    ///
    /// # Arguments
    /// * `model_name` - "BAAI/bge-reranker-base" or "rozgo/bge-reranker-v2-m3"
    /// * `top_n` - Number of candidates kept after reranking
    pub fn new(model_name: &str, top_n: usize) -> Result<Self, RerankError> {
        let reranker_model = match model_name {
            "BAAI/bge-reranker-base" | "bge-reranker-base" => RerankerModel::BGERerankerBase,
            "rozgo/bge-reranker-v2-m3" | "bge-reranker-v2-m3" => RerankerModel::BGERerankerV2M3,
            _ => {
                return Err(RerankError::InitializationError(format!(
                    "Unsupported reranker model: {}. Supported: BAAI/bge-reranker-base, rozgo/bge-reranker-v2-m3",
                    model_name
                )))
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(reranker_model).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            top_n,
        })
    }
}

#[async_trait]
impl Reranker for FastEmbedReranker {
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

        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let documents: Vec<String> = candidates.iter().map(|c| c.node.text.clone()).collect();

        let results = tokio::task::spawn_blocking(move || {
            let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
            model.rerank(query.as_str(), docs, false, None)
        })
        .await
        .map_err(|e| RerankError::RerankingError(e.to_string()))?
        .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        let ranking = results.into_iter().map(|r| (r.index, r.score)).collect();
        apply_ranking(candidates, ranking, self.top_n)
    }

    fn top_n(&self) -> usize {
        self.top_n
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
