//! Request-flow orchestration over the store, chat, and ingestion capabilities.
//!
//! Every flow is a straight-line composition of collaborator calls with no retries and no
//! local recovery; collaborator errors propagate to the HTTP boundary unmodified.

use crate::chat::{ChatClient, ChatClientError, ChatPrompt, MediaAttachment};
use crate::document::Document;
use crate::ingest::{DocumentIngestor, IngestError};
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::store::{EmbeddingStore, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the orchestration layer.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Document or image ingestion failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// The vector store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The chat model failed.
    #[error(transparent)]
    Generation(#[from] ChatClientError),
}

/// Operations exposed by the orchestrator to the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Forward `message` as the sole user turn with no retrieved context.
    async fn plain_query(&self, message: &str) -> Result<String, OrchestratorError>;

    /// Ingest the document behind `filepath` and return a confirmation string.
    async fn populate(&self, filepath: &str) -> Result<String, OrchestratorError>;

    /// Answer `message` grounded in up to `top_k` retrieved documents
    /// (falls back to the configured default when `top_k` is `None`).
    async fn rag_query(
        &self,
        message: &str,
        top_k: Option<usize>,
    ) -> Result<String, OrchestratorError>;

    /// Caption the image behind `image_path`, steering the model to guess when uncertain.
    async fn describe_image(
        &self,
        image_path: &str,
        message: &str,
    ) -> Result<String, OrchestratorError>;

    /// Caption the image, then answer a retrieval-augmented query whose search text is
    /// exactly that caption.
    async fn image_rag_query(
        &self,
        image_path: &str,
        message: &str,
    ) -> Result<String, OrchestratorError>;

    /// Seed the fixed demo documents and list the store's matches for `query`.
    async fn rag_test(&self, query: &str) -> Result<String, OrchestratorError>;

    /// Return the store's raw administrative collections listing.
    async fn fetch_collections(&self) -> Result<String, OrchestratorError>;

    /// Return the current ingestion counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Directs the model to answer with its best guess when it cannot identify the image.
const IMAGE_SYSTEM_INSTRUCTION: &str = "이미지를 확실히 식별할 수 없다면 최선의 추측을 해보세요.";

/// Documents retrieved per `rag_test` search.
const RAG_TEST_TOP_K: usize = 5;

/// Composes the ingestion, retrieval, and generation capabilities into request flows.
///
/// Collaborators are injected at construction; the service holds no other state beyond the
/// ingestion counters.
pub struct RagService {
    store: Arc<dyn EmbeddingStore>,
    chat: Arc<dyn ChatClient>,
    ingestor: DocumentIngestor,
    metrics: Arc<IngestMetrics>,
    default_top_k: usize,
}

impl RagService {
    /// Build a service over the given collaborators.
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        chat: Arc<dyn ChatClient>,
        ingestor: DocumentIngestor,
        default_top_k: usize,
    ) -> Self {
        Self {
            store,
            chat,
            ingestor,
            metrics: Arc::new(IngestMetrics::new()),
            default_top_k,
        }
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn plain_query(&self, message: &str) -> Result<String, OrchestratorError> {
        Ok(self.chat.generate(ChatPrompt::user(message)).await?)
    }

    async fn populate(&self, filepath: &str) -> Result<String, OrchestratorError> {
        let chunks = self.ingestor.ingest(filepath).await?;
        self.metrics.record_document(chunks as u64);
        Ok(format!(
            "Populated vector store with {filepath} ({chunks} chunks)"
        ))
    }

    async fn rag_query(
        &self,
        message: &str,
        top_k: Option<usize>,
    ) -> Result<String, OrchestratorError> {
        let top_k = top_k.unwrap_or(self.default_top_k);
        let documents = self.store.search(message, top_k).await?;
        tracing::debug!(hits = documents.len(), top_k, "Retrieved context");

        let prompt = build_rag_prompt(message, &documents);
        Ok(self.chat.generate(ChatPrompt::user(prompt)).await?)
    }

    async fn describe_image(
        &self,
        image_path: &str,
        message: &str,
    ) -> Result<String, OrchestratorError> {
        let media_type = media_type_for(image_path);
        let data = self.ingestor.fetch_bytes(image_path).await?;
        tracing::debug!(image_path, media_type, "Resolved image attachment");

        let prompt = ChatPrompt::user(message)
            .with_system(IMAGE_SYSTEM_INSTRUCTION)
            .with_media(MediaAttachment { media_type, data });
        Ok(self.chat.generate(prompt).await?)
    }

    async fn image_rag_query(
        &self,
        image_path: &str,
        message: &str,
    ) -> Result<String, OrchestratorError> {
        // The caption alone drives retrieval; the caller's message never reaches the search.
        let caption = self.describe_image(image_path, message).await?;
        tracing::debug!(caption = %caption, "Image caption feeds retrieval");
        self.rag_query(&caption, None).await
    }

    async fn rag_test(&self, query: &str) -> Result<String, OrchestratorError> {
        // Seeded on every call without an idempotence guard; repeated calls grow the index.
        self.store.add(demo_documents()).await?;

        let results = self.store.search(query, RAG_TEST_TOP_K).await?;

        let mut listing = String::new();
        for document in &results {
            listing.push_str("Document: ");
            listing.push_str(&document.content);
            listing.push('\n');
            if !document.metadata.is_empty() {
                let rendered: Vec<String> = document
                    .metadata
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect();
                listing.push_str("Metadata: ");
                listing.push_str(&rendered.join(", "));
                listing.push('\n');
            }
            listing.push('\n');
        }
        Ok(listing)
    }

    async fn fetch_collections(&self) -> Result<String, OrchestratorError> {
        Ok(self.store.fetch_collections_raw().await?)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Assemble the retrieval-augmented prompt.
///
/// Retrieved content is concatenated in rank order (most similar first) above the grounding
/// instruction. With no hits the user message passes through untouched, so answer quality
/// degrades gracefully instead of erroring.
fn build_rag_prompt(message: &str, documents: &[Document]) -> String {
    if documents.is_empty() {
        return message.to_string();
    }

    let context: Vec<&str> = documents
        .iter()
        .map(|document| document.content.as_str())
        .collect();

    format!(
        "{message}\n\n\
         Context information is below, surrounded by ---------------------\n\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\n\
         Given the context information and no prior knowledge, answer the query. \
         If the answer is not in the context, say that you don't know.",
        context.join("\n\n")
    )
}

/// Classify an image locator by suffix: `.png` means PNG, anything else means JPEG.
///
/// Deliberately suffix-only; the bytes are never sniffed.
fn media_type_for(image_locator: &str) -> &'static str {
    if image_locator.ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn demo_documents() -> Vec<Document> {
    vec![
        Document::with_metadata(
            "Spring AI 최고다!! Spring AI 최고다!! Spring AI 최고다!! Spring AI 최고다!! Spring AI 최고다!!",
            [("meta1".to_string(), "meta1".to_string())],
        ),
        Document::new("세상은 크고 구원은 코너 뒤에 숨어있다."),
        Document::with_metadata(
            "당신은 과거를 향해 걸어가고 미래를 향해 뒤돌아본다.",
            [("meta2".to_string(), "meta2".to_string())],
        ),
    ]
}
