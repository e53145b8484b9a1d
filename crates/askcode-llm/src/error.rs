#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("generation request failed: {0}")]
    Generation(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
