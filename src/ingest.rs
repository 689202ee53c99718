//! Document ingestion: locator resolution, text extraction, chunking, and store writes.
//!
//! A locator starting with `http` is fetched over the network; anything else is read from the
//! local filesystem. PDF content is extracted with `pdf-extract`; everything else must be
//! valid UTF-8 text. Re-ingesting the same locator stores its chunks again — there is no
//! deduplication.

use crate::chunking::{self, ChunkingError};
use crate::document::Document;
use crate::store::{EmbeddingStore, StoreError};
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while ingesting a document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Locator looked like a URL but could not be parsed as one.
    #[error("Malformed locator: {0}")]
    MalformedLocator(String),
    /// Locator did not resolve to a readable byte stream.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    /// Content could not be extracted from the resolved bytes.
    #[error("Failed to parse document: {0}")]
    Parse(String),
    /// Splitting the extracted text failed.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// The store rejected the chunk write.
    #[error("Failed to index document: {0}")]
    Store(#[from] StoreError),
}

/// Resolves locators into chunked documents and hands them to the embedding store.
pub struct DocumentIngestor {
    store: Arc<dyn EmbeddingStore>,
    http: Client,
    chunk_size: usize,
    tokenizer_model: String,
}

impl DocumentIngestor {
    /// Build an ingestor writing to `store` with a fixed chunk budget.
    ///
    /// `tokenizer_model` selects the token counter used by the splitter so the budget matches
    /// the embedding model the store was provisioned for.
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        chunk_size: usize,
        tokenizer_model: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .user_agent("ragserve/0.1")
            .build()
            .expect("Failed to construct reqwest::Client for ingestion");
        Self {
            store,
            http,
            chunk_size,
            tokenizer_model: tokenizer_model.into(),
        }
    }

    /// Resolve, extract, split, and store a document. Returns the number of chunks stored.
    pub async fn ingest(&self, locator: &str) -> Result<usize, IngestError> {
        tracing::info!(locator, "Populating vector store");

        let bytes = self.fetch_bytes(locator).await?;
        let text = extract_text(locator, &bytes)?;
        let chunks = chunking::chunk_text(&text, self.chunk_size, &self.tokenizer_model)?;

        let documents: Vec<Document> = chunks
            .into_iter()
            .map(|chunk| {
                Document::with_metadata(chunk, [("source".to_string(), locator.to_string())])
            })
            .collect();

        let stored = self.store.add(documents).await?;
        tracing::info!(locator, chunks = stored, "Vector store population complete");
        Ok(stored)
    }

    /// Resolve a locator (URL or filesystem path) into raw bytes.
    pub async fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>, IngestError> {
        if locator.starts_with("http") {
            let url = reqwest::Url::parse(locator)
                .map_err(|err| IngestError::MalformedLocator(format!("{locator}: {err}")))?;
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|err| IngestError::ResourceNotFound(format!("{locator}: {err}")))?;
            if !response.status().is_success() {
                return Err(IngestError::ResourceNotFound(format!(
                    "{locator}: HTTP {}",
                    response.status()
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|err| IngestError::ResourceNotFound(format!("{locator}: {err}")))?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(locator)
                .await
                .map_err(|err| IngestError::ResourceNotFound(format!("{locator}: {err}")))
        }
    }
}

fn extract_text(locator: &str, bytes: &[u8]) -> Result<String, IngestError> {
    if locator.to_lowercase().ends_with(".pdf") {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|err| IngestError::Parse(format!("{locator}: {err}")))
    } else {
        String::from_utf8(bytes.to_vec())
            .map_err(|err| IngestError::Parse(format!("{locator}: {err}")))
    }
}
