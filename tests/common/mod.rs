// Shared fixtures and scripted providers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use docent::embedding::{EmbeddingError, EmbeddingProvider};
use docent::error::{DocentError, Result};
use docent::index::{DocumentIndex, HnswParams, ScoredNode, DOCSTORE_FILE, VECTOR_STORE_FILE};
use docent::llm::{LanguageModel, LlmError, TokenStream};
use docent::pipeline::{PipelineFactory, QueryEngine, QueryPipeline, QueryResponse, SourceRef};
use docent::rerank::{RerankError, Reranker};
use docent::session::ResponseSink;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DIM: usize = 64;

pub const CORPUS: &[(&str, &str)] = &[
    ("node-paris", "Paris is the capital of France."),
    ("node-berlin", "Berlin is the capital of Germany."),
    ("node-rust", "Rust guarantees memory safety without a garbage collector."),
    ("node-tea", "Green tea is brewed at a lower temperature than black tea."),
];

/// Bag-of-words hashing embedding: texts sharing words land close together
pub fn hash_embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() % DIM as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    } else {
        vector[0] = 1.0;
    }
    vector
}

/// Write a persisted index in the on-disk layout the loader expects
pub fn write_index(dir: &Path, nodes: &[(&str, &str, Vec<f32>)]) {
    let mut docstore = serde_json::Map::new();
    let mut embeddings = serde_json::Map::new();
    let mut ref_docs = serde_json::Map::new();

    for (id, text, vector) in nodes {
        docstore.insert(
            id.to_string(),
            serde_json::json!({
                "__data__": {
                    "id_": id,
                    "text": text,
                    "metadata": { "file_name": "notes.pdf" },
                },
                "__type__": "1",
            }),
        );
        embeddings.insert(id.to_string(), serde_json::json!(vector));
        ref_docs.insert(id.to_string(), serde_json::json!("doc-1"));
    }

    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join(DOCSTORE_FILE),
        serde_json::to_vec(&serde_json::json!({ "docstore/data": docstore })).unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.join(VECTOR_STORE_FILE),
        serde_json::to_vec(&serde_json::json!({
            "embedding_dict": embeddings,
            "text_id_to_ref_doc_id": ref_docs,
            "metadata_dict": {},
        }))
        .unwrap(),
    )
    .unwrap();
}

/// Write [`CORPUS`] embedded with [`hash_embed`]
pub fn write_corpus(dir: &Path) {
    let nodes: Vec<_> = CORPUS
        .iter()
        .map(|(id, text)| (*id, *text, hash_embed(text)))
        .collect();
    write_index(dir, &nodes);
}

pub struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        Ok(hash_embed(text))
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}

/// Keeps the vector-search order, truncated to `top_n`
pub struct PassthroughReranker {
    pub top_n: usize,
}

#[async_trait]
impl Reranker for PassthroughReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<ScoredNode>,
    ) -> std::result::Result<Vec<ScoredNode>, RerankError> {
        candidates.truncate(self.top_n);
        Ok(candidates)
    }

    fn top_n(&self) -> usize {
        self.top_n
    }

    fn model_name(&self) -> &str {
        "passthrough"
    }
}

/// Answers with the context section of the prompt, word by word
#[derive(Default)]
pub struct ContextEchoLlm {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for ContextEchoLlm {
    async fn generate(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> std::result::Result<TokenStream, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let context = prompt
            .split("---------------------\n")
            .nth(1)
            .unwrap_or_default()
            .to_string();
        let tokens: Vec<String> = context
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();

        Ok(TokenStream::from_tokens(tokens, cancel))
    }

    fn model_name(&self) -> &str {
        "context-echo"
    }
}

/// Engine over a fixture index with in-process providers
pub fn echo_engine(dir: &Path) -> (QueryEngine, Arc<ContextEchoLlm>) {
    let index = DocumentIndex::load(dir, HnswParams::default()).unwrap();
    let llm = Arc::new(ContextEchoLlm::default());
    let engine = QueryEngine::new(
        index,
        Arc::new(HashEmbedder),
        llm.clone(),
        Arc::new(PassthroughReranker { top_n: 2 }),
        10,
    );
    (engine, llm)
}

/// How a [`ScriptedPipeline`] answers
#[derive(Clone)]
pub enum Script {
    /// Stream these tokens
    Tokens(Vec<String>),
    /// Stream these tokens, then fail
    FailAfter(Vec<String>),
    /// Fail before streaming anything
    FailUpfront,
    /// Never produce a token
    Hang,
}

/// Pipeline answering from a queue of scripts, recording every query
pub struct ScriptedPipeline {
    scripts: Mutex<Vec<Script>>,
    pub queries: Mutex<Vec<String>>,
}

impl ScriptedPipeline {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn tokens(tokens: &[&str]) -> Self {
        Self::new(vec![Script::Tokens(
            tokens.iter().map(|t| t.to_string()).collect(),
        )])
    }

    fn next_script(&self) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.len() > 1 {
            scripts.remove(0)
        } else {
            scripts[0].clone()
        }
    }
}

#[async_trait]
impl QueryPipeline for ScriptedPipeline {
    async fn query(&self, query: &str, cancel: CancellationToken) -> Result<QueryResponse> {
        self.queries.lock().unwrap().push(query.to_string());

        let tokens = match self.next_script() {
            Script::Tokens(tokens) => TokenStream::from_tokens(tokens, cancel),
            Script::FailAfter(tokens) => {
                let items = tokens
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(LlmError::Stream(
                        "connection reset".to_string(),
                    ))));
                TokenStream::new(futures::stream::iter(items), cancel)
            }
            Script::FailUpfront => {
                return Err(DocentError::Provider("embedding: service unavailable".to_string()))
            }
            Script::Hang => {
                let never = futures::stream::pending::<std::result::Result<String, LlmError>>();
                TokenStream::new(never, cancel)
            }
        };

        Ok(QueryResponse {
            source_nodes: Vec::new(),
            tokens,
        })
    }
}

/// Factory handing out one shared pipeline and counting builds
pub struct CountingFactory {
    pipeline: Option<Arc<dyn QueryPipeline>>,
    pub builds: AtomicUsize,
}

impl CountingFactory {
    pub fn new(pipeline: Arc<dyn QueryPipeline>) -> Self {
        Self {
            pipeline: Some(pipeline),
            builds: AtomicUsize::new(0),
        }
    }

    /// Every build fails as if the index were missing
    pub fn failing() -> Self {
        Self {
            pipeline: None,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineFactory for CountingFactory {
    async fn build(&self) -> Result<Arc<dyn QueryPipeline>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        match &self.pipeline {
            Some(pipeline) => Ok(Arc::clone(pipeline)),
            None => Err(DocentError::Storage(
                docent::index::IndexError::NotFound("/missing/storage".into()),
            )),
        }
    }
}

/// Sink that records everything it is asked to deliver
#[derive(Default)]
pub struct RecordingSink {
    pub sources: Vec<Vec<SourceRef>>,
    pub tokens: Vec<String>,
    pub sent: Vec<String>,
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn sources(&mut self, sources: &[SourceRef]) -> Result<()> {
        assert!(self.tokens.is_empty(), "sources arrived after a token");
        self.sources.push(sources.to_vec());
        Ok(())
    }

    async fn stream_token(&mut self, token: &str) -> Result<()> {
        self.tokens.push(token.to_string());
        Ok(())
    }

    async fn send(&mut self, content: &str) -> Result<()> {
        self.sent.push(content.to_string());
        Ok(())
    }
}

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(200);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(10);
