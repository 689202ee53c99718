//! HTTP surface for the RAG gateway.
//!
//! This module exposes a compact Axum router with a handful of read-triggered endpoints:
//!
//! - `GET /` – Static usage text.
//! - `GET /query` – Forward a message to the chat model with no retrieval.
//! - `GET /populate` – Ingest a document (file path or URL) into the vector store.
//! - `GET /rag` – Answer a message grounded in retrieved context.
//! - `GET /mm` – Caption an image with the multimodal model.
//! - `GET /imagerag` – Caption an image, then answer a retrieval-augmented query driven by
//!   the caption.
//! - `GET /ragtest` – Seed three fixed demo documents and list the store's matches.
//! - `GET /fetchCollections` – Raw pass-through of the store's collections listing.
//! - `GET /metrics` – Observe ingestion counters.
//!
//! All endpoints are GETs with query parameters; `populate` and `ragtest` are side-effecting
//! despite the verb.

use crate::chat::ChatClientError;
use crate::ingest::IngestError;
use crate::metrics::MetricsSnapshot;
use crate::orchestrator::{OrchestratorError, RagApi};
use crate::store::StoreError;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

/// Build the HTTP router exposing the orchestration surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/", get(describe))
        .route("/query", get(plain_query::<S>))
        .route("/populate", get(populate::<S>))
        .route("/rag", get(rag_query::<S>))
        .route("/mm", get(multimodal::<S>))
        .route("/imagerag", get(image_rag::<S>))
        .route("/ragtest", get(rag_test::<S>))
        .route("/fetchCollections", get(fetch_collections::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

const USAGE: &str = "\
This is an application to populate and query a vector store, effectively turning loose \n\
an AI on your data. This is a potentially powerful, focused tool, so as always, *verify your results*.\n\
\n\
To populate the vector store with embeddings for a supplied document, simply provide a \n\
file path or URL that resolves to the document to be processed:\n\
\n\
/populate?filepath=<path or URL>\n\
\n\
To query the vector store for documents/data that matches your query, use the following endpoint:\n\
\n\
/rag?message=<your query>\n\
\n\
DISCLAIMER: No warranty is provided or implied. Use at your own risk. :)\n";

async fn describe() -> &'static str {
    USAGE
}

#[derive(Deserialize)]
struct PlainQueryParams {
    message: String,
}

async fn plain_query<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<PlainQueryParams>,
) -> Result<String, AppError>
where
    S: RagApi,
{
    Ok(service.plain_query(&params.message).await?)
}

#[derive(Deserialize)]
struct PopulateParams {
    filepath: String,
}

async fn populate<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<PopulateParams>,
) -> Result<String, AppError>
where
    S: RagApi,
{
    Ok(service.populate(&params.filepath).await?)
}

#[derive(Deserialize)]
struct RagParams {
    #[serde(default = "default_rag_message")]
    message: String,
}

fn default_rag_message() -> String {
    "Airspeeds".to_string()
}

async fn rag_query<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<RagParams>,
) -> Result<String, AppError>
where
    S: RagApi,
{
    Ok(service.rag_query(&params.message, None).await?)
}

#[derive(Deserialize)]
struct ImageParams {
    #[serde(rename = "imagePath", default = "default_image_path")]
    image_path: String,
    #[serde(default = "default_image_message")]
    message: String,
}

fn default_image_path() -> String {
    "testdata/testimage.jpg".to_string()
}

fn default_image_message() -> String {
    "이 이미지에 무엇이 있나요?".to_string()
}

async fn multimodal<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<ImageParams>,
) -> Result<String, AppError>
where
    S: RagApi,
{
    Ok(service
        .describe_image(&params.image_path, &params.message)
        .await?)
}

async fn image_rag<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<ImageParams>,
) -> Result<String, AppError>
where
    S: RagApi,
{
    Ok(service
        .image_rag_query(&params.image_path, &params.message)
        .await?)
}

#[derive(Deserialize)]
struct RagTestParams {
    query: String,
}

async fn rag_test<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<RagTestParams>,
) -> Result<String, AppError>
where
    S: RagApi,
{
    Ok(service.rag_test(&params.query).await?)
}

async fn fetch_collections<S>(State(service): State<Arc<S>>) -> Result<String, AppError>
where
    S: RagApi,
{
    Ok(service.fetch_collections().await?)
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

struct AppError(OrchestratorError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::Ingest(IngestError::ResourceNotFound(_)) => StatusCode::NOT_FOUND,
            OrchestratorError::Ingest(IngestError::MalformedLocator(_)) => StatusCode::BAD_REQUEST,
            OrchestratorError::Store(StoreError::Unreachable(_))
            | OrchestratorError::Generation(ChatClientError::ProviderUnavailable(_)) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(inner: OrchestratorError) -> Self {
        Self(inner)
    }
}
