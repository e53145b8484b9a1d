//! HNSW vector index keyed by chunk id, backed by `usearch`.

use std::path::{Path, PathBuf};

use tracing::debug;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::{IndexError, Result};
use crate::types::ChunkId;

/// Build and search parameters for the HNSW graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexParams {
    /// Points allocated up front (default: 10000).
    pub initial_capacity: usize,
    /// Graph degree, `M` (default: 16).
    pub connectivity: usize,
    /// Candidate list size during insertion, `ef_construction` (default: 200).
    pub expansion_add: usize,
    /// Candidate list size during search, `ef` (default: 64).
    pub expansion_search: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            initial_capacity: 10_000,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 64,
        }
    }
}

/// One ANN result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: ChunkId,
    /// Cosine distance, `0.0` for identical direction.
    pub distance: f32,
}

/// Capacity to reserve so that `needed` points fit: `max(needed, current * 1.5)`.
#[must_use]
pub fn grow_target(current: usize, needed: usize) -> usize {
    needed.max(current.saturating_add(current / 2))
}

pub struct VectorIndex {
    index: Index,
    dimension: usize,
    params: IndexParams,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("len", &self.index.size())
            .field("capacity", &self.index.capacity())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Allocate an empty cosine index with `params.initial_capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns an error if `dimension` is zero or the engine rejects the options.
    pub fn new(dimension: usize, params: IndexParams) -> Result<Self> {
        let index = Self::engine(dimension, &params)?;
        index
            .reserve(params.initial_capacity.max(1))
            .map_err(|e| IndexError::VectorIndex(format!("reserve failed: {e}")))?;
        Ok(Self {
            index,
            dimension,
            params,
        })
    }

    fn engine(dimension: usize, params: &IndexParams) -> Result<Index> {
        if dimension == 0 {
            return Err(IndexError::VectorIndex("dimension must be > 0".into()));
        }
        let options = IndexOptions {
            dimensions: dimension,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: params.connectivity,
            expansion_add: params.expansion_add,
            expansion_search: params.expansion_search,
            multi: false,
        };
        Index::new(&options)
            .map_err(|e| IndexError::VectorIndex(format!("failed to create index: {e}")))
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    /// # Errors
    ///
    /// Returns an error if the id is negative.
    pub fn contains(&self, id: ChunkId) -> Result<bool> {
        Ok(self.index.contains(id.key()?))
    }

    /// Insert one point, growing capacity first when the index is full.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` for a wrong-length vector, `DuplicatePoint`
    /// if `id` is already indexed, or an engine error.
    pub fn add(&self, id: ChunkId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let key = id.key()?;
        if self.index.contains(key) {
            return Err(IndexError::DuplicatePoint(id));
        }

        self.ensure_capacity(self.index.size() + 1)?;
        self.index
            .add(key, vector)
            .map_err(|e| IndexError::VectorIndex(format!("add {id} failed: {e}")))
    }

    fn ensure_capacity(&self, needed: usize) -> Result<()> {
        let current = self.index.capacity();
        if needed <= current {
            return Ok(());
        }
        let target = grow_target(current, needed);
        self.index
            .reserve(target)
            .map_err(|e| IndexError::VectorIndex(format!("reserve {target} failed: {e}")))?;
        debug!(old_capacity = current, new_capacity = target, "grew vector index");
        Ok(())
    }

    /// The `k` nearest points by ascending cosine distance.
    ///
    /// Equal distances are ordered by id, so earlier-inserted points win,
    /// including ties that straddle the `k`-th position: the search widens
    /// until a point strictly farther than the `k`-th is seen or every point
    /// has been returned. Returns fewer than `k` results only when fewer
    /// points are indexed.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` for a wrong-length query, or an engine error.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let total = self.index.size();
        let k = k.min(total);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut count = (k + 1).min(total);
        loop {
            let mut neighbors = self.search_sorted(vector, count)?;
            let settled = count >= total
                || neighbors.len() < count
                || neighbors[count - 1].distance > neighbors[k - 1].distance;
            if settled {
                neighbors.truncate(k);
                return Ok(neighbors);
            }
            debug!(k, count, "widening search past tied boundary");
            count = count.saturating_mul(2).min(total);
        }
    }

    fn search_sorted(&self, vector: &[f32], count: usize) -> Result<Vec<Neighbor>> {
        self.index
            .change_expansion_search(self.params.expansion_search.max(count));
        let matches = self
            .index
            .search(vector, count)
            .map_err(|e| IndexError::VectorIndex(format!("search failed: {e}")))?;

        let mut neighbors = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&key, &distance)| {
                Ok(Neighbor {
                    id: ChunkId::from_key(key)?,
                    distance,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        Ok(neighbors)
    }

    /// Write the index to `path` through a temporary sibling and a rename,
    /// so `path` always holds either the previous or the new blob.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the rename fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = temp_path(path);
        self.index
            .save(&tmp.to_string_lossy())
            .map_err(|e| IndexError::VectorIndex(format!("save to {} failed: {e}", tmp.display())))?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a saved index, rejecting a blob whose dimensionality is not `dimension`.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` or an engine error.
    pub fn load(path: &Path, dimension: usize, params: IndexParams) -> Result<Self> {
        let index = Self::engine(dimension, &params)?;
        index.load(&path.to_string_lossy()).map_err(|e| {
            IndexError::VectorIndex(format!("load from {} failed: {e}", path.display()))
        })?;

        let stored = index.dimensions();
        if stored != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: stored,
            });
        }
        index.change_expansion_search(params.expansion_search);

        Ok(Self {
            index,
            dimension,
            params,
        })
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
