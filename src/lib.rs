#![deny(missing_docs)]

//! Core library for the ragserve RAG gateway.

/// HTTP routing and REST handlers.
pub mod api;
/// Chat model capability and the Ollama adapter.
pub mod chat;
/// Token-bounded text splitting.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Shared document types.
pub mod document;
/// Embedding client abstraction and the Ollama adapter.
pub mod embedding;
/// Document ingestion pipeline.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Request-flow orchestration.
pub mod orchestrator;
/// Vector store capability and the Qdrant adapter.
pub mod store;
