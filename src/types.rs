//! Core chunk types, the crate-wide error taxonomy, and the flat JSON
//! interchange files that connect the offline pipeline stages.
//!
//! The harvest stage writes [`TextChunk`]s, the embed stage turns them into
//! [`EmbeddedChunk`]s, and the index stage loads those into a vector store.
//! Each stage consumes the previous stage's file and nothing else.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

/// Errors raised anywhere in the harvest → embed → index → answer pipeline.
///
/// Build-time binaries treat `Fetch` as per-page and recoverable (log, skip,
/// continue) and everything else as fatal to the current run. The query path
/// never lets any of these reach the HTTP caller; see
/// [`Chatbot::ask`](crate::answer::Chatbot::ask).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network or HTTP failure while fetching a single page.
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// The embedding or language model could not be loaded or reached.
    #[error("model '{model}' unavailable: {message}")]
    ModelLoad { model: String, message: String },

    /// Missing or inconsistent configuration, including index spec mismatches.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Upsert or query failure against the vector index.
    #[error("index error: {0}")]
    Index(String),

    /// Language-model call failure while generating an answer.
    #[error("generation error: {0}")]
    Generation(String),

    /// Interchange-file I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Interchange-file encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A paragraph-sized unit of retrieval produced by the harvest stage.
///
/// Invariants: `text` is trimmed, non-empty, longer than the configured
/// minimum, and `id` is stable across re-runs (`{source_url}_{ordinal}`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: String,
    pub text: String,
    pub source_url: String,
}

/// A [`TextChunk`] paired with its embedding vector.
///
/// The embedding and the chunk text always travel together; the vector's
/// length is the embedding model's native dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub id: String,
    pub text: String,
    pub source_url: String,
    pub embedding: Vec<f32>,
}

/// Reads the harvest stage's chunk file.
pub async fn read_chunks(path: &Path) -> Result<Vec<TextChunk>, PipelineError> {
    let data = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&data)?)
}

/// Writes the harvest stage's chunk file.
pub async fn write_chunks(path: &Path, chunks: &[TextChunk]) -> Result<(), PipelineError> {
    write_pretty(path, chunks).await
}

/// Reads the embed stage's output file.
pub async fn read_embedded(path: &Path) -> Result<Vec<EmbeddedChunk>, PipelineError> {
    let data = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&data)?)
}

/// Writes the embed stage's output file.
pub async fn write_embedded(path: &Path, chunks: &[EmbeddedChunk]) -> Result<(), PipelineError> {
    write_pretty(path, chunks).await
}

async fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized).await?;
    Ok(())
}
