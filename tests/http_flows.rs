//! End-to-end request flows over mock Qdrant and Ollama servers.
//!
//! These tests wire the real adapters (Qdrant REST client, Ollama chat and embedding
//! clients) to `httpmock` servers and drive them through the Axum router, covering the
//! full path from query parameter to collaborator wire format.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};
use ragserve::api::create_router;
use ragserve::chat::OllamaChatClient;
use ragserve::embedding::OllamaEmbeddingClient;
use ragserve::ingest::DocumentIngestor;
use ragserve::orchestrator::RagService;
use ragserve::store::QdrantStore;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;

fn router_over(qdrant: &MockServer, ollama: &MockServer) -> axum::Router {
    let embedder =
        OllamaEmbeddingClient::new(&ollama.base_url(), "nomic-embed-text").expect("embedder");
    let store = Arc::new(
        QdrantStore::new(&qdrant.base_url(), None, "docs", 2, Box::new(embedder))
            .expect("store"),
    );
    let ingestor = DocumentIngestor::new(store.clone(), 64, "nomic-embed-text");
    let chat = Arc::new(OllamaChatClient::new(ollama.base_url(), "llama", "llava"));
    let service = RagService::new(store, chat, ingestor, 5);
    create_router(Arc::new(service))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, String::from_utf8(body.to_vec()).expect("utf8 body"))
}

fn embed_mock_body() -> serde_json::Value {
    json!({
        "model": "nomic-embed-text",
        "embeddings": [[0.1, 0.2]],
        "total_duration": 1,
        "load_duration": 1,
        "prompt_eval_count": 1
    })
}

#[tokio::test]
async fn rag_query_grounds_the_generation_in_retrieved_context() {
    let qdrant = MockServer::start_async().await;
    let ollama = MockServer::start_async().await;

    let embed = ollama
        .mock_async(|when, then| {
            when.method(POST).path("/api/embed").body_contains("hello");
            then.status(200).json_body(embed_mock_body());
        })
        .await;
    let search = qdrant
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/docs/points/query")
                .body_contains("\"limit\":5");
            then.status(200).json_body(json!({
                "result": {
                    "points": [
                        {"id": 1, "score": 0.9, "payload": {"text": "airspeed of an unladen swallow", "metadata": {}}}
                    ]
                }
            }));
        })
        .await;
    let generate = ollama
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("airspeed of an unladen swallow")
                .body_contains("hello");
            then.status(200).json_body(json!({
                "response": "About 24 miles per hour.",
                "done": true
            }));
        })
        .await;

    let app = router_over(&qdrant, &ollama);
    let (status, body) = get(app, "/rag?message=hello").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "About 24 miles per hour.");
    embed.assert();
    search.assert();
    generate.assert();
}

#[tokio::test]
async fn populate_ingests_a_local_file_and_reports_metrics() {
    let qdrant = MockServer::start_async().await;
    let ollama = MockServer::start_async().await;

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "a short document about swallows").unwrap();
    let locator = file.path().to_str().unwrap().to_string();

    let embed = ollama
        .mock_async(|when, then| {
            when.method(POST).path("/api/embed").body_contains("swallows");
            then.status(200).json_body(embed_mock_body());
        })
        .await;
    let upsert = qdrant
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/docs/points")
                .query_param("wait", "true")
                .body_contains("swallows");
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;

    let app = router_over(&qdrant, &ollama);
    let (status, body) = get(app.clone(), &format!("/populate?filepath={locator}")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&locator));
    embed.assert();
    upsert.assert();

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let metrics: serde_json::Value = serde_json::from_str(&body).expect("metrics json");
    assert_eq!(metrics["documents_ingested"], 1);
    assert_eq!(metrics["chunks_ingested"], 1);
}

#[tokio::test]
async fn populate_with_missing_file_is_a_404_and_never_touches_the_store() {
    let qdrant = MockServer::start_async().await;
    let ollama = MockServer::start_async().await;

    let upsert = qdrant
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/docs/points");
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;

    let app = router_over(&qdrant, &ollama);
    let (status, _) = get(app, "/populate?filepath=/no/such/file.txt").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(upsert.hits_async().await, 0);
}

#[tokio::test]
async fn image_rag_drives_retrieval_with_the_caption() {
    let qdrant = MockServer::start_async().await;
    let ollama = MockServer::start_async().await;

    let mut image = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("temp image");
    image.write_all(&[0x89, 0x50, 0x4e, 0x47]).unwrap();
    let image_path = image.path().to_str().unwrap().to_string();

    // Caption call: the only generate request carrying an image payload.
    let caption = ollama
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("\"images\"")
                .body_contains("\"model\":\"llava\"");
            then.status(200).json_body(json!({
                "response": "a white cat",
                "done": true
            }));
        })
        .await;
    // The retrieval embedding must be computed from the caption, not the user message.
    let embed = ollama
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/embed")
                .body_contains("a white cat");
            then.status(200).json_body(embed_mock_body());
        })
        .await;
    let search = qdrant
        .mock_async(|when, then| {
            when.method(POST).path("/collections/docs/points/query");
            then.status(200).json_body(json!({
                "result": {
                    "points": [
                        {"id": 1, "score": 0.8, "payload": {"text": "cats are mammals", "metadata": {}}}
                    ]
                }
            }));
        })
        .await;
    let answer = ollama
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("a white cat")
                .body_contains("cats are mammals");
            then.status(200).json_body(json!({
                "response": "Everything about this cat.",
                "done": true
            }));
        })
        .await;

    let app = router_over(&qdrant, &ollama);
    let (status, body) = get(
        app,
        &format!("/imagerag?imagePath={image_path}&message=tell%20me%20everything"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Everything about this cat.");
    caption.assert();
    embed.assert();
    search.assert();
    answer.assert();
}

#[tokio::test]
async fn fetch_collections_passes_the_admin_body_through() {
    let qdrant = MockServer::start_async().await;
    let ollama = MockServer::start_async().await;

    let raw = r#"{"result":{"collections":[{"name":"docs"}]},"status":"ok"}"#;
    qdrant
        .mock_async(|when, then| {
            when.method(GET).path("/collections");
            then.status(200).body(raw);
        })
        .await;

    let app = router_over(&qdrant, &ollama);
    let (status, body) = get(app, "/fetchCollections").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, raw);
}

#[tokio::test]
async fn ragtest_seeds_demo_documents_and_lists_hits() {
    let qdrant = MockServer::start_async().await;
    let ollama = MockServer::start_async().await;

    // Three demo documents embedded per call, plus one query embedding.
    let seed_embed = ollama
        .mock_async(|when, then| {
            when.method(POST).path("/api/embed").body_contains("Spring AI");
            then.status(200).json_body(json!({
                "model": "nomic-embed-text",
                "embeddings": [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]],
                "total_duration": 1,
                "load_duration": 1,
                "prompt_eval_count": 3
            }));
        })
        .await;
    let query_embed = ollama
        .mock_async(|when, then| {
            when.method(POST).path("/api/embed").body_contains("swallows");
            then.status(200).json_body(embed_mock_body());
        })
        .await;
    let upsert = qdrant
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/docs/points")
                .body_contains("meta1");
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;
    qdrant
        .mock_async(|when, then| {
            when.method(POST).path("/collections/docs/points/query");
            then.status(200).json_body(json!({
                "result": {
                    "points": [
                        {
                            "id": 1,
                            "score": 0.99,
                            "payload": {
                                "text": "Spring AI 최고다!! Spring AI 최고다!! Spring AI 최고다!! Spring AI 최고다!! Spring AI 최고다!!",
                                "metadata": {"meta1": "meta1"}
                            }
                        }
                    ]
                }
            }));
        })
        .await;

    let app = router_over(&qdrant, &ollama);
    let (status, body) = get(app, "/ragtest?query=swallows").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Spring AI"));
    assert!(body.contains("meta1=meta1"));
    seed_embed.assert();
    query_embed.assert();
    upsert.assert();
}
