//! Vector store capability and the Qdrant-backed implementation.
//!
//! The store is accessed through the [`EmbeddingStore`] trait so the orchestrator never sees
//! transport details. The Qdrant adapter speaks the REST API directly over `reqwest`; query
//! and document vectors are produced by an injected [`EmbeddingClient`].

use crate::document::Document;
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned while interacting with the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid vector store URL: {0}")]
    InvalidUrl(String),
    /// The store could not be reached or the HTTP exchange failed.
    #[error("Vector store unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    /// The store rejected a write.
    #[error("Vector store write failed ({status}): {body}")]
    WriteRejected {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The store rejected a query.
    #[error("Vector store query failed ({status}): {body}")]
    QueryRejected {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Embedding the text to store or search with failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
}

/// Capability interface for storing and retrieving documents by similarity.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Embed and persist the documents; returns the number stored.
    async fn add(&self, documents: Vec<Document>) -> Result<usize, StoreError>;

    /// Return up to `top_k` stored documents ranked by similarity to `query`, most similar
    /// first. Scores are not exposed; rank order is the contract.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Document>, StoreError>;

    /// Fetch the raw response body of the store's administrative collections listing.
    async fn fetch_collections_raw(&self) -> Result<String, StoreError>;
}

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    vector_size: u64,
    embedder: Box<dyn EmbeddingClient>,
}

impl QdrantStore {
    /// Construct a store client for the given Qdrant endpoint and collection.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        collection: impl Into<String>,
        vector_size: u64,
        embedder: Box<dyn EmbeddingClient>,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().user_agent("ragserve/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            collection: collection.into(),
            vector_size,
            embedder,
        })
    }

    /// Create the configured collection when it is missing from Qdrant.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(collection = %self.collection, "Collection created");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::WriteRejected { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Collection creation failed");
            Err(error)
        }
    }

    async fn collection_exists(&self) -> Result<bool, StoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = StoreError::QueryRejected { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

#[async_trait]
impl EmbeddingStore for QdrantStore {
    async fn add(&self, documents: Vec<Document>) -> Result<usize, StoreError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|doc| doc.content.clone()).collect();
        let vectors = self.embedder.generate_embeddings(texts).await?;

        let points: Vec<Value> = documents
            .into_iter()
            .zip(vectors.into_iter())
            .map(|(document, vector)| {
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "vector": vector,
                    "payload": {
                        "text": document.content,
                        "metadata": document.metadata,
                    }
                })
            })
            .collect();

        let point_count = points.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(
                collection = %self.collection,
                points = point_count,
                "Points indexed"
            );
            Ok(point_count)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::WriteRejected { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant write failed");
            Err(error)
        }
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Document>, StoreError> {
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let vector = vectors.pop().ok_or_else(|| {
            StoreError::Embedding(EmbeddingClientError::GenerationFailed(
                "no query embedding returned".to_string(),
            ))
        })?;

        let body = json!({
            "query": vector,
            "limit": top_k,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::QueryRejected { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        // Qdrant already returns hits in descending score order.
        Ok(points
            .into_iter()
            .map(|point| document_from_payload(point.payload))
            .collect())
    }

    async fn fetch_collections_raw(&self) -> Result<String, StoreError> {
        let response = self.request(Method::GET, "collections").send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::QueryRejected { status, body };
            tracing::error!(error = %error, "Failed to fetch collections");
            return Err(error);
        }

        let body = response.text().await?;
        tracing::info!(response = %body, "Collections response");
        Ok(body)
    }
}

fn document_from_payload(payload: Option<Map<String, Value>>) -> Document {
    let Some(payload) = payload else {
        return Document::new("");
    };

    let content = payload
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let metadata: BTreeMap<String, String> = payload
        .get("metadata")
        .and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(key, value)| {
                    value
                        .as_str()
                        .map(|text| (key.clone(), text.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    Document { content, metadata }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
struct QueryPoint {
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}
