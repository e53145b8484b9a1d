//! Store descriptor: the embedding model and dimension a generation was built with.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Immutable for the lifetime of one store generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    pub embedding_model: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
}

impl StoreDescriptor {
    #[must_use]
    pub fn new(embedding_model: impl Into<String>, dimension: usize) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            dimension,
            created_at: Utc::now(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a descriptor.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the descriptor as pretty JSON, replacing `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reject an embedding model or probed dimension this generation was not built with.
    ///
    /// # Errors
    ///
    /// Returns `ModelMismatch` or `DimensionMismatch`.
    pub fn check(&self, embedding_model: &str, dimension: usize) -> Result<()> {
        if self.embedding_model != embedding_model {
            return Err(IndexError::ModelMismatch {
                expected: self.embedding_model.clone(),
                actual: embedding_model.to_owned(),
            });
        }
        self.check_dimension(dimension)
    }

    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `dimension` differs from the stored one.
    pub fn check_dimension(&self, dimension: usize) -> Result<()> {
        if self.dimension != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: dimension,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        let descriptor = StoreDescriptor::new("nomic-embed-text", 768);
        descriptor.write(&path).unwrap();

        assert_eq!(StoreDescriptor::read(&path).unwrap(), descriptor);
        assert!(!path.with_extension("json.tmp").exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"embedding_model\": \"nomic-embed-text\""));
        assert!(raw.contains("\"dimension\": 768"));
    }

    #[test]
    fn check_rejects_other_model_and_dimension() {
        let descriptor = StoreDescriptor::new("nomic-embed-text", 768);
        assert!(descriptor.check("nomic-embed-text", 768).is_ok());
        assert!(matches!(
            descriptor.check("mxbai-embed-large", 768),
            Err(IndexError::ModelMismatch { .. })
        ));
        assert!(matches!(
            descriptor.check("nomic-embed-text", 1024),
            Err(IndexError::DimensionMismatch {
                expected: 768,
                actual: 1024
            })
        ));
    }

    #[test]
    fn read_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, b"{\"dim\": 3}").unwrap();
        assert!(matches!(
            StoreDescriptor::read(&path),
            Err(IndexError::Json(_))
        ));
    }
}
