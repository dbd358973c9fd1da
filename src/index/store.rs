//! Reader for the persisted index directory
//!
//! Layout written by the document-index toolchain that builds the corpus:
//! `docstore.json` holds node text and metadata, `default__vector_store.json`
//! holds one embedding per node id. Files are only ever read.

use super::{IndexError, Node};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTOR_STORE_FILE: &str = "default__vector_store.json";

#[derive(Debug, Deserialize)]
struct VectorStoreFile {
    embedding_dict: HashMap<String, Vec<f32>>,
    #[serde(default)]
    text_id_to_ref_doc_id: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DocStoreFile {
    #[serde(rename = "docstore/data", default)]
    data: HashMap<String, StoredNode>,
}

#[derive(Debug, Deserialize)]
struct StoredNode {
    #[serde(rename = "__data__")]
    data: NodeData,
}

#[derive(Debug, Deserialize)]
struct NodeData {
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// Nodes and their embeddings, in a stable (id-sorted) order
#[derive(Debug)]
pub struct PersistedIndex {
    pub nodes: Vec<Node>,
    pub embeddings: Vec<Vec<f32>>,
    pub dimension: usize,
}

/// Read and join the docstore and vector store found in `dir`
pub fn read_persisted(dir: &Path) -> Result<PersistedIndex, IndexError> {
    if !dir.is_dir() {
        return Err(IndexError::NotFound(dir.to_path_buf()));
    }

    let vectors: VectorStoreFile = read_json(&dir.join(VECTOR_STORE_FILE))?;
    let mut docstore: DocStoreFile = read_json(&dir.join(DOCSTORE_FILE))?;

    if vectors.embedding_dict.is_empty() {
        return Err(IndexError::Empty);
    }

    let mut entries: Vec<(String, Vec<f32>)> = vectors.embedding_dict.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let dimension = entries[0].1.len();
    if dimension == 0 {
        return Err(IndexError::DimensionMismatch {
            id: entries[0].0.clone(),
            expected: 1,
            actual: 0,
        });
    }

    let mut nodes = Vec::with_capacity(entries.len());
    let mut embeddings = Vec::with_capacity(entries.len());

    for (id, embedding) in entries {
        if embedding.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                id,
                expected: dimension,
                actual: embedding.len(),
            });
        }

        let stored = docstore
            .data
            .remove(&id)
            .ok_or_else(|| IndexError::MissingNode(id.clone()))?;

        nodes.push(Node {
            ref_doc_id: vectors.text_id_to_ref_doc_id.get(&id).cloned(),
            id,
            text: stored.data.text,
            metadata: stored.data.metadata,
        });
        embeddings.push(embedding);
    }

    Ok(PersistedIndex {
        nodes,
        embeddings,
        dimension,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, IndexError> {
    let content = std::fs::read(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&content).map_err(|source| IndexError::Corrupt {
        path: PathBuf::from(path),
        source,
    })
}
