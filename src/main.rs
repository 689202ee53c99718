use ragserve::chat::OllamaChatClient;
use ragserve::chunking;
use ragserve::embedding::OllamaEmbeddingClient;
use ragserve::ingest::DocumentIngestor;
use ragserve::orchestrator::RagService;
use ragserve::store::QdrantStore;
use ragserve::{api, config, logging};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let config = config::get_config();

    let embedder = OllamaEmbeddingClient::new(&config.ollama_url, config.embedding_model.clone())
        .expect("Failed to construct embedding client");
    let store = Arc::new(
        QdrantStore::new(
            &config.qdrant_url,
            config.qdrant_api_key.clone(),
            config.qdrant_collection_name.clone(),
            config.embedding_dimension as u64,
            Box::new(embedder),
        )
        .expect("Failed to construct Qdrant client"),
    );
    store
        .ensure_collection()
        .await
        .expect("Failed to ensure Qdrant collection exists");

    let chunk_size =
        chunking::determine_chunk_size(config.text_splitter_chunk_size, &config.embedding_model);
    let ingestor =
        DocumentIngestor::new(store.clone(), chunk_size, config.embedding_model.clone());
    let chat = Arc::new(OllamaChatClient::new(
        config.ollama_url.clone(),
        config.chat_model.clone(),
        config.multimodal_model().to_string(),
    ));

    let service = RagService::new(store, chat, ingestor, config.search_default_top_k);
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8080..=8099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8080-8099",
    ))
}
