//! Chat model capability and the Ollama-backed adapter.
//!
//! The adapter issues blocking (non-streaming) requests against Ollama's `/api/generate`
//! endpoint. Image attachments travel base64-encoded; when one is present the request is
//! routed to the image-capable model.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while generating text with the chat model.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Provider endpoint was unreachable or missing.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate response: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Image attachment carried alongside a prompt's user text.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    /// MIME type selected for the image.
    pub media_type: &'static str,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

/// Prompt passed to the chat model.
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    /// Optional system instruction steering the model.
    pub system: Option<String>,
    /// The user turn.
    pub user: String,
    /// Optional image attachment.
    pub media: Option<MediaAttachment>,
}

impl ChatPrompt {
    /// Build a prompt holding only a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            user: text.into(),
            media: None,
        }
    }

    /// Attach a system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach an image.
    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media = Some(media);
        self
    }
}

/// Interface implemented by text generation providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Generate a completion for the prompt and return the text verbatim.
    async fn generate(&self, prompt: ChatPrompt) -> Result<String, ChatClientError>;
}

/// Chat client backed by a local Ollama runtime.
pub struct OllamaChatClient {
    http: Client,
    base_url: String,
    chat_model: String,
    multimodal_model: String,
}

impl OllamaChatClient {
    /// Construct a client targeting the given Ollama base URL.
    ///
    /// `multimodal_model` handles prompts carrying an image; plain prompts go to `chat_model`.
    pub fn new(
        base_url: impl Into<String>,
        chat_model: impl Into<String>,
        multimodal_model: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .user_agent("ragserve/0.1")
            .build()
            .expect("Failed to construct reqwest::Client for chat");
        Self {
            http,
            base_url: base_url.into(),
            chat_model: chat_model.into(),
            multimodal_model: multimodal_model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn generate(&self, prompt: ChatPrompt) -> Result<String, ChatClientError> {
        let model = if prompt.media.is_some() {
            &self.multimodal_model
        } else {
            &self.chat_model
        };

        let mut payload = json!({
            "model": model,
            "prompt": prompt.user,
            "stream": false,
        });
        let body = payload
            .as_object_mut()
            .expect("request body should remain an object");

        if let Some(system) = &prompt.system {
            body.insert("system".into(), json!(system));
        }

        if let Some(media) = &prompt.media {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&media.data);
            tracing::debug!(
                media_type = media.media_type,
                bytes = media.data.len(),
                "Attaching image to prompt"
            );
            body.insert("images".into(), json!([encoded]));
        }

        tracing::debug!(model = %model, "Dispatching generation request");

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ChatClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            ChatClientError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(ChatClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatClient, ChatClientError, ChatPrompt, MediaAttachment, OllamaChatClient};
    use base64::Engine;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn plain_prompt_uses_chat_model() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("\"model\":\"llama\"")
                    .body_contains("\"prompt\":\"hello\"");
                then.status(200).json_body(json!({
                    "response": "Generated text",
                    "done": true
                }));
            })
            .await;

        let client = OllamaChatClient::new(server.base_url(), "llama", "llava");
        let text = client
            .generate(ChatPrompt::user("hello"))
            .await
            .expect("generation");

        mock.assert();
        assert_eq!(text, "Generated text");
    }

    #[tokio::test]
    async fn image_prompt_routes_to_multimodal_model_with_encoded_bytes() {
        let server = MockServer::start_async().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("\"model\":\"llava\"")
                    .body_contains(encoded.as_str())
                    .body_contains("\"system\":\"guess\"");
                then.status(200).json_body(json!({
                    "response": "A caption",
                    "done": true
                }));
            })
            .await;

        let client = OllamaChatClient::new(server.base_url(), "llama", "llava");
        let prompt = ChatPrompt::user("what is this?")
            .with_system("guess")
            .with_media(MediaAttachment {
                media_type: "image/jpeg",
                data: vec![1, 2, 3],
            });
        let text = client.generate(prompt).await.expect("generation");

        mock.assert();
        assert_eq!(text, "A caption");
    }

    #[tokio::test]
    async fn error_status_surfaces_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let client = OllamaChatClient::new(server.base_url(), "llama", "llava");
        let error = client
            .generate(ChatPrompt::user("hello"))
            .await
            .expect_err("error response");
        assert!(matches!(error, ChatClientError::GenerationFailed(message) if message.contains("500")));
    }

    #[tokio::test]
    async fn incomplete_response_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "partial",
                    "done": false
                }));
            })
            .await;

        let client = OllamaChatClient::new(server.base_url(), "llama", "llava");
        let error = client
            .generate(ChatPrompt::user("hello"))
            .await
            .expect_err("incomplete response");
        assert!(matches!(error, ChatClientError::InvalidResponse(_)));
    }
}
