use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;

use crate::error::LlmError;
use crate::provider::{ChatOptions, LlmProvider};

const DEFAULT_PORT: u16 = 11434;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
        }
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client.list_local_models().await.map_err(|e| {
            LlmError::Unavailable(format!("failed to connect to Ollama, is it running? {e}"))
        })?;
        Ok(())
    }
}

impl LlmProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        tracing::trace!(model = %self.embedding_model, chars = text.len(), "embedding");
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Embedding(format!("Ollama embedding request failed: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider: "ollama" })
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        let messages = vec![
            ChatMessage::system(system.to_owned()),
            ChatMessage::user(user.to_owned()),
        ];
        tracing::debug!(
            model = %self.model,
            prompt_chars = system.len() + user.len(),
            num_ctx = options.num_ctx,
            "sending chat request"
        );
        let request = ChatMessageRequest::new(self.model.clone(), messages).options(
            ModelOptions::default()
                .num_ctx(u64::from(options.num_ctx))
                .temperature(options.temperature),
        );

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::Generation(format!("Ollama chat request failed: {e}")))?;

        if response.message.content.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "ollama" });
        }
        Ok(response.message.content)
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_with_port() {
        let (host, port) = parse_host_port("http://127.0.0.1:11434");
        assert_eq!(host, "http://127.0.0.1");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_without_port() {
        let (host, port) = parse_host_port("http://localhost");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, DEFAULT_PORT);
    }

    #[test]
    fn parse_host_port_trailing_slash() {
        let (host, port) = parse_host_port("http://localhost:8080/");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 8080);
    }

    #[test]
    fn parse_host_port_overflow_falls_back() {
        let (host, port) = parse_host_port("http://localhost:99999");
        assert_eq!(host, "http://localhost:99999");
        assert_eq!(port, DEFAULT_PORT);
    }

    #[test]
    fn embedding_model_reported() {
        let provider = OllamaProvider::new(
            "http://localhost:11434",
            "qwen2.5-coder:7b".into(),
            "nomic-embed-text".into(),
        );
        assert_eq!(provider.embedding_model(), "nomic-embed-text");
        assert_eq!(provider.name(), "ollama");
    }
}
