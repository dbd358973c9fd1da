/// HNSW vector index for similarity search
use super::IndexError;
use hnsw_rs::prelude::*;

/// Hard cap from hnsw_rs on the number of layers
const MAX_LAYERS: usize = 16;

/// Search result with position and similarity score
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Position of the node in the loaded index
    pub id: usize,
    /// Cosine similarity score (higher is more similar)
    pub score: f32,
}

/// HNSW parameters
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Number of connections per layer
    pub m: usize,
    /// Construction parameter (higher = better recall, slower build)
    pub ef_construction: usize,
    /// Search parameter (higher = better recall, slower search)
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// In-memory HNSW over the persisted embeddings
///
/// Built once when a session loads the index and never mutated afterwards.
/// Uses cosine distance; scores are reported as `1 - distance`.
pub struct VectorIndex {
    index: Hnsw<'static, f32, DistCosine>,
    dimension: usize,
    count: usize,
    ef_search: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("count", &self.count)
            .field("ef_search", &self.ef_search)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Build an index over `vectors`; vector `i` is reported back as id `i`
    pub fn build(vectors: &[Vec<f32>], params: HnswParams) -> Result<Self, IndexError> {
        let dimension = vectors.first().map(Vec::len).ok_or(IndexError::Empty)?;

        let index = Hnsw::<f32, DistCosine>::new(
            params.m,
            vectors.len(),
            MAX_LAYERS,
            params.ef_construction,
            DistCosine,
        );

        for (id, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexError::InvalidDimension {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            index.insert((vector, id));
        }

        Ok(Self {
            index,
            dimension,
            count: vectors.len(),
            ef_search: params.ef_search,
        })
    }

    /// Search for k nearest neighbors, sorted by score descending
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let k = k.min(self.count);
        if k == 0 {
            return Ok(Vec::new());
        }

        let neighbours = self.index.search(query, k, self.ef_search.max(k));

        let mut results: Vec<SearchResult> = neighbours
            .into_iter()
            .map(|neighbour| SearchResult {
                id: neighbour.d_id,
                score: 1.0 - neighbour.distance,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        Ok(results)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
