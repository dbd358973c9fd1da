//! Session-start wiring of index + embedder + LLM + reranker

use super::{QueryEngine, QueryPipeline};
use crate::config::{expand_tilde, Config, Credentials};
use crate::error::{DocentError, Result};
use crate::index::{DocumentIndex, HnswParams};
use crate::{embedding, llm, rerank};
use async_trait::async_trait;
use std::sync::Arc;

/// Builds the query pipeline for a new chat session
#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn build(&self) -> Result<Arc<dyn QueryPipeline>>;
}

/// Factory driven by the loaded configuration and startup credentials
pub struct ConfiguredPipelineFactory {
    config: Arc<Config>,
    credentials: Arc<Credentials>,
}

impl ConfiguredPipelineFactory {
    pub fn new(config: Arc<Config>, credentials: Arc<Credentials>) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

#[async_trait]
impl PipelineFactory for ConfiguredPipelineFactory {
    async fn build(&self) -> Result<Arc<dyn QueryPipeline>> {
        let config = Arc::clone(&self.config);
        let credentials = Arc::clone(&self.credentials);

        // Index parsing, HNSW construction and local model loading all block
        let engine = tokio::task::spawn_blocking(move || -> Result<QueryEngine> {
            let embedder = embedding::from_config(&config, &credentials)?;
            let llm = llm::from_config(&config, &credentials)?;
            let reranker = rerank::from_config(&config, &credentials)?;

            let retrieval = &config.retrieval;
            let index = DocumentIndex::load(
                &expand_tilde(&config.storage.persist_dir),
                HnswParams {
                    m: retrieval.hnsw_m,
                    ef_construction: retrieval.hnsw_ef_construction,
                    ef_search: retrieval.hnsw_ef_search,
                },
            )?;

            Ok(QueryEngine::new(
                index,
                embedder,
                llm,
                reranker,
                retrieval.similarity_top_k,
            ))
        })
        .await
        .map_err(|e| DocentError::Other(anyhow::anyhow!("pipeline construction panicked: {}", e)))??;

        if self.config.session.probe_embedding {
            probe_embedding(&engine).await?;
        }

        Ok(Arc::new(engine))
    }
}

/// Check the embedding service answers and matches the index dimension
async fn probe_embedding(engine: &QueryEngine) -> Result<()> {
    let vector = engine.embedder.embed("ping").await?;
    let expected = engine.index().dimension();

    if vector.len() != expected {
        return Err(DocentError::Config(format!(
            "Embedding model {} produces {}D vectors but the index holds {}D vectors",
            engine.embedder.model_name(),
            vector.len(),
            expected
        )));
    }

    Ok(())
}
