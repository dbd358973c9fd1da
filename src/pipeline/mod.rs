//! Query pipeline: embed -> retrieve top-K -> rerank top-N -> generate
//!
//! One pipeline is built per chat session and never changes afterwards.

mod factory;

pub use factory::{ConfiguredPipelineFactory, PipelineFactory};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::{DocumentIndex, ScoredNode};
use crate::llm::{LanguageModel, TokenStream};
use crate::prompt::render_qa_prompt;
use crate::rerank::Reranker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Answer to one query: the passages used plus the lazily generated text
pub struct QueryResponse {
    pub source_nodes: Vec<ScoredNode>,
    pub tokens: TokenStream,
}

impl QueryResponse {
    pub fn sources(&self) -> Vec<SourceRef> {
        self.source_nodes.iter().map(SourceRef::from).collect()
    }
}

/// Summary of one passage the answer was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub score: f32,
    pub preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

const PREVIEW_CHARS: usize = 80;

impl From<&ScoredNode> for SourceRef {
    fn from(scored: &ScoredNode) -> Self {
        Self {
            id: scored.node.id.clone(),
            score: scored.score,
            preview: scored.preview(PREVIEW_CHARS),
            file_name: scored
                .node
                .metadata
                .get("file_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

/// Anything that turns a query string into a streamed answer
#[async_trait]
pub trait QueryPipeline: Send + Sync {
    async fn query(&self, query: &str, cancel: CancellationToken) -> Result<QueryResponse>;
}

/// Retrieval-augmented query engine over a loaded [`DocumentIndex`]
pub struct QueryEngine {
    index: DocumentIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    reranker: Arc<dyn Reranker>,
    similarity_top_k: usize,
}

impl QueryEngine {
    pub fn new(
        index: DocumentIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        reranker: Arc<dyn Reranker>,
        similarity_top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            reranker,
            similarity_top_k,
        }
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub fn similarity_top_k(&self) -> usize {
        self.similarity_top_k
    }
}

#[async_trait]
impl QueryPipeline for QueryEngine {
    async fn query(&self, query: &str, cancel: CancellationToken) -> Result<QueryResponse> {
        let embedding = self.embedder.embed(query).await?;

        let retrieved = self.index.retrieve(&embedding, self.similarity_top_k)?;
        let retrieved_count = retrieved.len();

        let kept = self.reranker.rerank(query, retrieved).await?;

        tracing::debug!(
            retrieved = retrieved_count,
            kept = kept.len(),
            top_n = self.reranker.top_n(),
            reranker = self.reranker.model_name(),
            "Context selected"
        );
        for node in &kept {
            tracing::trace!(score = node.score, "{}", node.preview(PREVIEW_CHARS));
        }

        let prompt = render_qa_prompt(kept.iter().map(|n| n.node.text.as_str()), query);
        let tokens = self.llm.generate(&prompt, cancel).await?;

        Ok(QueryResponse {
            source_nodes: kept,
            tokens,
        })
    }
}
