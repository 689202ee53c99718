//! Token-bounded text splitting for ingestion.
//!
//! Splitting is delegated to `semchunk` with a model-aware token counter, so identical input
//! always produces identical chunks. The default budget is derived from the embedding model's
//! context window and clamped into a predictable range.

use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base};

type TokenCounter = Box<dyn Fn(&str) -> usize>;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Embedding model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

const MIN_AUTOMATIC_CHUNK_SIZE: usize = 256;
const MAX_AUTOMATIC_CHUNK_SIZE: usize = 2048;

/// Derive the token budget for a single chunk.
///
/// An explicit override always wins. Otherwise the budget starts from the embedding model's
/// context window and is clamped into a range that keeps retrieval latency predictable.
pub fn determine_chunk_size(override_size: Option<usize>, model: &str) -> usize {
    if let Some(explicit) = override_size {
        return explicit.max(1);
    }

    let window = embedding_context_window(model);
    let base = (window / 4).max(1);
    base.clamp(MIN_AUTOMATIC_CHUNK_SIZE, MAX_AUTOMATIC_CHUNK_SIZE)
}

fn embedding_context_window(model: &str) -> usize {
    let normalized = model.to_lowercase();
    match normalized.as_str() {
        "nomic-embed-text" | "mxbai-embed-large" | "mxbai-embed-large-v1" => 8192,
        value if value.contains("all-minilm") => 512,
        value if value.contains("e5-large") => 4096,
        _ => {
            // Ollama models do not report context sizes; keep the fallback explicit.
            tracing::trace!(model, "Using default context window estimate");
            4096
        }
    }
}

/// Split text into chunks bounded by `chunk_size` tokens.
///
/// Empty or whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize, model: &str) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let token_counter = build_token_counter(model);
    Ok(chunk_text_with_counter(text, chunk_size, token_counter))
}

fn build_token_counter(model: &str) -> TokenCounter {
    match build_tiktoken_counter(model) {
        Ok(counter) => counter,
        Err(error) => {
            tracing::warn!(
                model,
                error = %error,
                "Tokenizer unavailable for model; falling back to whitespace counter"
            );
            default_token_counter()
        }
    }
}

fn build_tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);

    Ok(Box::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(model, error = %model_err, "Tokenizer model lookup failed; trying encoding name");
            if let Some(candidate) = encoding_from_name(model) {
                candidate
            } else {
                tracing::debug!(model, "Falling back to 'cl100k_base' encoding for token counting");
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

fn default_token_counter() -> TokenCounter {
    Box::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

fn chunk_text_with_counter(text: &str, chunk_size: usize, token_counter: TokenCounter) -> Vec<String> {
    let chunker = Chunker::new(chunk_size, token_counter);
    chunker.chunk(text)
}
