use std::path::PathBuf;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ASKCODE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("ASKCODE_EMBED_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("ASKCODE_GEN_MODEL") {
            self.llm.generation_model = v;
        }
        if let Ok(v) = std::env::var("ASKCODE_STORE_PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ASKCODE_MAX_LINES") {
            if let Ok(n) = v.parse::<usize>() {
                self.chunker.max_lines = n;
            } else {
                tracing::warn!("ignoring invalid ASKCODE_MAX_LINES value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ASKCODE_OVERLAP") {
            if let Ok(n) = v.parse::<usize>() {
                self.chunker.overlap = n;
            } else {
                tracing::warn!("ignoring invalid ASKCODE_OVERLAP value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ASKCODE_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.k = k;
        }
        if let Ok(v) = std::env::var("ASKCODE_MAX_CONTEXT_CHARS")
            && let Ok(chars) = v.parse::<usize>()
        {
            self.retrieval.max_context_chars = chars;
        }
    }
}
