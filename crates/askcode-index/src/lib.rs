//! Line-window code indexing and nearest-neighbour retrieval.
//!
//! Source files are split into overlapping line windows, each window is
//! recorded once in a `SQLite` metadata table and embedded into a `usearch`
//! HNSW graph under the same id. Queries over-fetch from the graph, keep one
//! chunk per file and pack the result into a character budget.

pub mod chunker;
pub mod descriptor;
pub mod error;
pub mod generation;
pub mod indexer;
pub mod languages;
pub mod retriever;
pub mod snippet;
pub mod store;
pub mod types;
pub mod vector_index;
pub mod walker;

pub use error::{IndexError, Result};
pub use generation::{StoreGeneration, StoreLayout, StoreLock};
pub use indexer::{CodeIndexer, DEFAULT_SAVE_EVERY, IndexReport, IndexerConfig};
pub use retriever::{RetrievalConfig, Retriever};
pub use snippet::Snippet;
