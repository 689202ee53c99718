//! Embedding client abstraction and the Ollama-backed adapter.

use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;
use reqwest::Url;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider base URL failed to parse.
    #[error("Invalid embedding provider URL: {0}")]
    InvalidUrl(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Embedding client backed by a local Ollama runtime.
#[derive(Debug)]
pub struct OllamaEmbeddingClient {
    ollama: Ollama,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Construct a client targeting the given Ollama base URL and embedding model.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, EmbeddingClientError> {
        let url = Url::parse(base_url)
            .map_err(|err| EmbeddingClientError::InvalidUrl(format!("{base_url}: {err}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| EmbeddingClientError::InvalidUrl(base_url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(11434);

        Ok(Self {
            ollama: Ollama::new(format!("{}://{host}", url.scheme()), port),
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let count = texts.len();
        tracing::debug!(model = %self.model, texts = count, "Generating embeddings");

        let request = GenerateEmbeddingsRequest::new(self.model.clone(), texts.into());
        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| {
                EmbeddingClientError::GenerationFailed(format!(
                    "model '{}': {error}",
                    self.model
                ))
            })?;

        if response.embeddings.len() != count {
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "expected {count} embeddings, provider returned {}",
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}
