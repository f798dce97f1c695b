//! Embedding providers.
//!
//! [`EmbeddingProvider`] is the seam between the pipeline and whatever model
//! actually produces vectors. [`OllamaEmbedder`] talks to a local Ollama
//! server; [`MockEmbeddingProvider`] produces deterministic hash-derived
//! vectors for tests and offline experiments.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::types::{EmbeddedChunk, PipelineError, TextChunk};

/// Maps text to fixed-length dense vectors.
///
/// Implementations must be deterministic for a fixed model version: the same
/// text always yields the same vector. The model id and dimension are
/// recorded in the index metadata and validated at query time.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying model, e.g. `all-minilm`.
    fn model_id(&self) -> &str;

    /// Native output dimension of the model.
    fn dimension(&self) -> usize;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;

    /// Embeds a batch of texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Embeds every chunk with `provider`, preserving order and all
/// non-embedding fields. Any per-chunk failure aborts the whole batch.
pub async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: Vec<TextChunk>,
) -> Result<Vec<EmbeddedChunk>, PipelineError> {
    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let vectors = provider.embed_batch(&texts).await?;
    if vectors.len() != chunks.len() {
        return Err(PipelineError::ModelLoad {
            model: provider.model_id().to_string(),
            message: format!(
                "provider returned {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            ),
        });
    }
    Ok(chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, embedding)| EmbeddedChunk {
            id: chunk.id,
            text: chunk.text,
            source_url: chunk.source_url,
            embedding,
        })
        .collect())
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding provider backed by Ollama's `/api/embeddings` endpoint.
#[derive(Clone, Debug)]
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    /// Connects to Ollama and probes the model with a warm-up embed.
    ///
    /// Probe failure means the model cannot be loaded and surfaces as
    /// [`PipelineError::ModelLoad`]; a probe vector whose length differs from
    /// `dimension` is a [`PipelineError::Configuration`].
    pub async fn connect(
        client: Client,
        base_url: &Url,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, PipelineError> {
        let model = model.into();
        let endpoint = format!(
            "{}/api/embeddings",
            base_url.as_str().trim_end_matches('/')
        );
        let embedder = Self {
            client,
            endpoint,
            model,
            dimension,
        };

        let probe = embedder.embed_raw("warmup probe").await?;
        if probe.len() != dimension {
            return Err(PipelineError::Configuration(format!(
                "model '{}' produces {}-dimensional vectors, expected {}",
                embedder.model,
                probe.len(),
                dimension
            )));
        }
        tracing::info!(model = %embedder.model, dimension, "embedding model ready");
        Ok(embedder)
    }

    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let model_err = |message: String| PipelineError::ModelLoad {
            model: self.model.clone(),
            message,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "model": self.model, "prompt": text }))
            .send()
            .await
            .map_err(|err| model_err(err.to_string()))?
            .error_for_status()
            .map_err(|err| model_err(err.to_string()))?;
        let body: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|err| model_err(err.to_string()))?;
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let vector = self.embed_raw(text).await?;
        if vector.len() != self.dimension {
            return Err(PipelineError::Configuration(format!(
                "model '{}' returned a {}-dimensional vector, expected {}",
                self.model,
                vector.len(),
                self.dimension
            )));
        }
        Ok(vector)
    }
}

/// Deterministic provider for tests: vectors are derived from a hash of the
/// input text, so identical text always embeds identically.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dimension(crate::config::DEFAULT_DIMENSION)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn model_id(&self) -> &str {
        "mock-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        Ok(hash_to_vec(text, self.dimension))
    }
}

fn hash_to_vec(text: &str, dimension: usize) -> Vec<f32> {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..dimension)
        .map(|i| {
            let bits = seed.rotate_left(((i * 8) % 64) as u32) ^ ((i as u64) << 24);
            (bits as f32) / u32::MAX as f32
        })
        .collect()
}
