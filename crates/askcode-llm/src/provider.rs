use crate::error::LlmError;

/// Sampling options for a single generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub num_ctx: u32,
    pub temperature: f32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            num_ctx: 4096,
            temperature: 0.2,
        }
    }
}

/// Opaque embedding/generation service.
///
/// `embed` is the only suspension point of an indexing run. Implementations
/// must not retry internally: a failure aborts the caller's current run.
pub trait LlmProvider: Send + Sync {
    /// Embed `text` into a fixed-length vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or returns no vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Run a single system + user prompt and return the generated text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the response is empty.
    fn chat(
        &self,
        system: &str,
        user: &str,
        options: ChatOptions,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Identifier of the model used by `embed`.
    fn embedding_model(&self) -> &str;

    fn name(&self) -> &str;
}
