//! Test-only deterministic provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LlmError;
use crate::provider::{ChatOptions, LlmProvider};

/// Embeds text by hashing its bytes into a fixed number of buckets.
///
/// Identical texts always map to identical vectors, and every vector has at
/// least one non-zero component so cosine distance stays defined.
#[derive(Debug, Clone)]
pub struct MockProvider {
    pub dimension: usize,
    pub model: String,
    pub default_response: String,
    /// Fail every `embed` call once this many calls have succeeded.
    pub fail_after: Option<usize>,
    embed_calls: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            dimension: 8,
            model: "mock-embed".into(),
            default_response: "mock summary".into(),
            fail_after: None,
            embed_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_owned();
        self
    }

    #[must_use]
    pub fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    /// Number of successful and failed `embed` invocations so far.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for (i, byte) in text.bytes().enumerate() {
            vector[(usize::from(byte) + i) % self.dimension] += 1.0;
        }
        vector[0] += 1.0;
        vector
    }
}

impl LlmProvider for MockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let previous = self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| previous >= limit) {
            return Err(LlmError::Embedding("mock embedding failure".into()));
        }
        Ok(self.vector_for(text))
    }

    async fn chat(
        &self,
        _system: &str,
        _user: &str,
        _options: ChatOptions,
    ) -> Result<String, LlmError> {
        Ok(self.default_response.clone())
    }

    fn embedding_model(&self) -> &str {
        &self.model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
