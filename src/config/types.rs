use std::path::PathBuf;

use askcode_index::DEFAULT_SAVE_EVERY;
use askcode_index::chunker::ChunkerConfig;
use askcode_index::retriever::RetrievalConfig;
use askcode_index::vector_index::IndexParams;
use askcode_index::walker::{DEFAULT_MAX_FILE_BYTES, WalkerConfig};
use askcode_llm::ChatOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunker: ChunkingConfig,
    #[serde(default)]
    pub walker: SourceConfig,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_generation_model() -> String {
    "qwen2.5-coder:7b".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("rag_store")
}

fn default_initial_capacity() -> usize {
    10_000
}

fn default_connectivity() -> usize {
    16
}

fn default_expansion_add() -> usize {
    200
}

fn default_expansion_search() -> usize {
    64
}

fn default_save_every() -> usize {
    DEFAULT_SAVE_EVERY
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    #[serde(default = "default_connectivity")]
    pub connectivity: usize,
    #[serde(default = "default_expansion_add")]
    pub expansion_add: usize,
    #[serde(default = "default_expansion_search")]
    pub expansion_search: usize,
    /// Files between vector index saves during a run; 0 saves only at the end.
    #[serde(default = "default_save_every")]
    pub save_every: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            initial_capacity: default_initial_capacity(),
            connectivity: default_connectivity(),
            expansion_add: default_expansion_add(),
            expansion_search: default_expansion_search(),
            save_every: default_save_every(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn index_params(&self) -> IndexParams {
        IndexParams {
            initial_capacity: self.initial_capacity,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
        }
    }
}

fn default_max_lines() -> usize {
    120
}

fn default_overlap() -> usize {
    20
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    #[must_use]
    pub fn chunker(&self) -> ChunkerConfig {
        ChunkerConfig {
            max_lines: self.max_lines,
            overlap: self.overlap,
        }
    }
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Extensions to index; empty keeps the built-in set.
    #[serde(default)]
    pub include: Vec<String>,
    /// Directory names skipped in addition to the built-in set.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl SourceConfig {
    #[must_use]
    pub fn walker(&self) -> WalkerConfig {
        WalkerConfig {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            max_file_bytes: self.max_file_bytes,
        }
    }
}

fn default_k() -> usize {
    8
}

fn default_max_context_chars() -> usize {
    12_000
}

fn default_num_ctx() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.2
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: default_k(),
            max_context_chars: default_max_context_chars(),
            num_ctx: default_num_ctx(),
            temperature: default_temperature(),
        }
    }
}

impl RetrievalSettings {
    #[must_use]
    pub fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            k: self.k,
            max_context_chars: self.max_context_chars,
        }
    }

    #[must_use]
    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            num_ctx: self.num_ctx,
            temperature: self.temperature,
        }
    }
}
