//! Read-only document index
//!
//! Loads the persisted corpus (node text + embeddings) and answers
//! nearest-neighbour queries over it with an in-memory HNSW.

mod store;
mod vector_index;

pub use store::{read_persisted, PersistedIndex, DOCSTORE_FILE, VECTOR_STORE_FILE};
pub use vector_index::{HnswParams, SearchResult, VectorIndex};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt index file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Index contains no embeddings")]
    Empty,

    #[error("Node {0} has an embedding but no docstore entry")]
    MissingNode(String),

    #[error("Embedding for node {id} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// A passage of the corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Source document the passage was split from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_doc_id: Option<String>,
}

/// A node with its relevance score for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node: Node,
    pub score: f32,
}

impl ScoredNode {
    pub fn new(node: Node, score: f32) -> Self {
        Self { node, score }
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        match self.node.text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.node.text[..cut]),
            None => self.node.text.clone(),
        }
    }
}

/// Persisted corpus loaded into memory
#[derive(Debug)]
pub struct DocumentIndex {
    nodes: Vec<Node>,
    vectors: VectorIndex,
}

impl DocumentIndex {
    /// Load the index persisted in `dir`
    pub fn load(dir: &Path, params: HnswParams) -> Result<Self, IndexError> {
        let persisted = read_persisted(dir)?;
        let vectors = VectorIndex::build(&persisted.embeddings, params)?;

        tracing::info!(
            "Loaded index from {:?}: {} nodes, {}D",
            dir,
            persisted.nodes.len(),
            persisted.dimension
        );

        Ok(Self {
            nodes: persisted.nodes,
            vectors,
        })
    }

    /// Top-`k` nodes nearest to `query`, best first
    pub fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<ScoredNode>, IndexError> {
        let hits = self.vectors.search(query, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.nodes
                    .get(hit.id)
                    .map(|node| ScoredNode::new(node.clone(), hit.score))
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }
}
