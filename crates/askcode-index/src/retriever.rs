//! Query-time retrieval: over-fetch, resolve, diversify, budget.

use std::collections::{HashMap, HashSet};

use askcode_llm::LlmProvider;
use tracing::debug;

use crate::error::Result;
use crate::generation::StoreGeneration;
use crate::snippet::Snippet;
use crate::types::ChunkId;

/// Retrieval configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Distinct files to return at most (default: 8).
    pub k: usize,
    /// Character budget for all returned snippets together (default: 12000).
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 8,
            max_context_chars: 12_000,
        }
    }
}

/// Candidates requested from the vector index for `k` results.
#[must_use]
pub fn overfetch(k: usize) -> usize {
    k.saturating_mul(3).max(k)
}

/// Keep the first candidate of each distinct path, in rank order, up to `k`.
pub fn select_diverse<T, F>(candidates: impl IntoIterator<Item = T>, k: usize, path_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(k);
    for candidate in candidates {
        if kept.len() >= k {
            break;
        }
        if seen.insert(path_of(&candidate).to_owned()) {
            kept.push(candidate);
        }
    }
    kept
}

/// Greedily keep snippets in order while the running character total fits.
///
/// Stops at the first snippet that would overflow; later snippets are
/// dropped even if shorter, and no snippet is truncated.
#[must_use]
pub fn pack_within_budget(snippets: Vec<Snippet>, max_chars: usize) -> Vec<Snippet> {
    let mut used = 0usize;
    let mut packed = Vec::with_capacity(snippets.len());
    for snippet in snippets {
        let cost = snippet.char_len();
        if used + cost > max_chars {
            break;
        }
        used += cost;
        packed.push(snippet);
    }
    packed
}

/// Read-only retrieval over one open generation.
#[derive(Debug, Clone, Copy)]
pub struct Retriever<'g> {
    generation: &'g StoreGeneration,
}

impl<'g> Retriever<'g> {
    #[must_use]
    pub fn new(generation: &'g StoreGeneration) -> Self {
        Self { generation }
    }

    /// Ranked, path-diverse, budget-trimmed snippets for a query vector.
    ///
    /// Candidate ids without a metadata record are skipped.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` for a wrong-length query, or a store error.
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        k: usize,
        max_context_chars: usize,
    ) -> Result<Vec<Snippet>> {
        self.generation
            .descriptor()
            .check_dimension(query_vector.len())?;

        let neighbors = self.generation.index().query(query_vector, overfetch(k))?;
        let distances: HashMap<ChunkId, f32> =
            neighbors.iter().map(|n| (n.id, n.distance)).collect();
        let ids: Vec<ChunkId> = neighbors.iter().map(|n| n.id).collect();

        let records = self.generation.store().fetch_many(&ids).await?;
        let resolved = records.len();
        let kept = select_diverse(records, k, |r| r.path.as_str());

        let snippets: Vec<Snippet> = kept
            .iter()
            .map(|r| Snippet::from_record(r, distances.get(&r.id).copied().unwrap_or(f32::MAX)))
            .collect();
        let diverse = snippets.len();
        let packed = pack_within_budget(snippets, max_context_chars);

        debug!(
            candidates = ids.len(),
            resolved,
            diverse,
            packed = packed.len(),
            "retrieval complete"
        );
        Ok(packed)
    }

    /// Embed `question` with `provider`, then [`Retriever::retrieve`].
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or the vector does not match the store.
    pub async fn search<P: LlmProvider>(
        &self,
        provider: &P,
        question: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<Snippet>> {
        let query_vector = provider.embed(question).await?;
        self.retrieve(&query_vector, config.k, config.max_context_chars)
            .await
    }
}
