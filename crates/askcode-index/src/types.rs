//! Record types shared by the metadata store, vector index and retriever.

use std::fmt;

use crate::error::{IndexError, Result};
use crate::languages::Lang;

/// Strongly typed chunk id: positive, assigned once by the metadata store,
/// and used verbatim as the vector index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct ChunkId(pub i64);

impl ChunkId {
    /// Vector index key for this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is negative.
    pub fn key(self) -> Result<u64> {
        Ok(u64::try_from(self.0)?)
    }

    /// # Errors
    ///
    /// Returns an error if `key` does not fit a `SQLite` integer.
    pub fn from_key(key: u64) -> Result<Self> {
        Ok(Self(i64::try_from(key)?))
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-width BLAKE3 digest over a chunk's path, line range and content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; blake3::OUT_LEN]);

impl ContentHash {
    /// Digest of one chunk identity. Pure and deterministic.
    #[must_use]
    pub fn of(path: &str, start_line: usize, end_line: usize, content: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("{path}:{start_line}:{end_line}\n").as_bytes());
        hasher.update(content.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// # Errors
    ///
    /// Returns an error if `hex` is not 64 hex characters.
    pub fn from_hex(hex: &str) -> Result<Self> {
        blake3::Hash::from_hex(hex)
            .map(|h| Self(*h.as_bytes()))
            .map_err(|e| IndexError::Other(format!("invalid content hash {hex:?}: {e}")))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One persisted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub path: String,
    pub language: Option<Lang>,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub content_hash: ContentHash,
}

/// Parameters for inserting a chunk. The id is assigned by the store.
#[derive(Debug, Clone, Copy)]
pub struct ChunkInsert<'a> {
    pub path: &'a str,
    pub language: Option<Lang>,
    pub start_line: usize,
    pub end_line: usize,
    pub content: &'a str,
    pub content_hash: ContentHash,
}

impl<'a> ChunkInsert<'a> {
    /// Build an insert for a window of `path`, computing its digest.
    #[must_use]
    pub fn new(
        path: &'a str,
        language: Option<Lang>,
        start_line: usize,
        end_line: usize,
        content: &'a str,
    ) -> Self {
        Self {
            path,
            language,
            start_line,
            end_line,
            content,
            content_hash: ContentHash::of(path, start_line, end_line, content),
        }
    }
}

/// Outcome of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// A new record was written under this id.
    New(ChunkId),
    /// A record with the same digest already existed; nothing was written.
    Existing(ChunkId),
}

impl Inserted {
    #[must_use]
    pub fn id(self) -> ChunkId {
        match self {
            Self::New(id) | Self::Existing(id) => id,
        }
    }

    #[must_use]
    pub fn is_new(self) -> bool {
        matches!(self, Self::New(_))
    }
}
