//! Error types for askcode-index.

use std::num::TryFromIntError;
use std::path::PathBuf;

use crate::types::ChunkId;

/// Errors that can occur while indexing or querying a store generation.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files or store artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `SQLite` database error.
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Embedding backend error. Aborts the current run.
    #[error("embedding service error: {0}")]
    Llm(#[from] askcode_llm::LlmError),

    /// Descriptor serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HNSW engine error.
    #[error("vector index error: {0}")]
    VectorIndex(String),

    /// No artifact of the store exists at this location.
    #[error("no store at {}: index a repository to create one", .0.display())]
    StoreAbsent(PathBuf),

    /// Some artifacts exist but the generation is not usable.
    #[error("store at {} is incomplete (missing {}): a full rebuild is required", .path.display(), .missing.join(", "))]
    StoreIncomplete {
        path: PathBuf,
        missing: Vec<&'static str>,
    },

    /// The descriptor and the vector index blob disagree on dimensionality.
    #[error("store at {} is inconsistent: descriptor dimension {descriptor}, index dimension {index}: a full rebuild is required", .path.display())]
    StoreMismatch {
        path: PathBuf,
        descriptor: usize,
        index: usize,
    },

    /// A vector's length differs from the generation's dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The configured embedding model differs from the one the store was built with.
    #[error("embedding model mismatch: store built with {expected:?}, configured {actual:?}")]
    ModelMismatch { expected: String, actual: String },

    /// The vector index holds points that have no metadata record.
    #[error("vector index holds {points} points but metadata has {records} records: a full rebuild is required")]
    Misaligned { points: usize, records: usize },

    /// A point with this id is already indexed.
    #[error("chunk id {0} already present in vector index")]
    DuplicatePoint(ChunkId),

    /// Chunking parameters cannot make progress.
    #[error("invalid chunking parameters: {0}")]
    InvalidChunking(String),

    /// Another process holds a conflicting lock on the store.
    #[error("store at {} is locked by another process", .0.display())]
    Locked(PathBuf),

    /// Integer conversion error.
    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// True for errors that can only be cleared by a full rebuild.
    #[must_use]
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            Self::StoreAbsent(_)
                | Self::StoreIncomplete { .. }
                | Self::StoreMismatch { .. }
                | Self::Misaligned { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_message_lists_missing_artifacts() {
        let err = IndexError::StoreIncomplete {
            path: PathBuf::from("rag_store"),
            missing: vec!["index.usearch", "meta.json"],
        };
        let msg = err.to_string();
        assert!(msg.contains("index.usearch, meta.json"));
        assert!(msg.contains("rebuild"));
        assert!(err.requires_rebuild());
    }

    #[test]
    fn dimension_mismatch_does_not_require_rebuild() {
        let err = IndexError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 768, got 384");
        assert!(!err.requires_rebuild());
    }
}
