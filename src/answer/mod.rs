//! The query-time pipeline: embed the question, retrieve the most similar
//! chunks, assemble a grounded prompt, generate an answer, cite sources.
//!
//! [`Chatbot`] is constructed once at process start from its collaborators
//! (embedding provider, vector index, generator) and is immutable
//! afterwards, so it can be shared across requests behind an `Arc` without
//! locking. The fallible path is [`Chatbot::answer`]; [`Chatbot::ask`] is
//! the outermost boundary that converts any failure into a degraded,
//! well-formed reply so the serving process never crashes on a query.

pub mod prompt;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingProvider;
use crate::generation::Generator;
use crate::stores::{ScoredChunk, VectorIndex};
use crate::types::PipelineError;

pub use prompt::PromptTemplate;

/// Number of chunks retrieved per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// Reply served while the pipeline failed to initialize at startup.
pub const NOT_READY_ANSWER: &str = "Chatbot is not ready. Please check server logs for errors.";

/// Maximum snippet length inside a citation.
const SNIPPET_CHARS: usize = 100;

/// A finished reply: the generated answer plus one formatted citation per
/// retrieved chunk (possibly none).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    pub sources: Vec<String>,
}

impl ChatReply {
    /// The degraded reply returned when any query-time stage fails.
    pub fn degraded(err: &PipelineError) -> Self {
        Self {
            answer: format!("An error occurred while processing your request: {err}"),
            sources: Vec::new(),
        }
    }

    /// The fixed reply served before the pipeline is constructed.
    pub fn not_ready() -> Self {
        Self {
            answer: NOT_READY_ANSWER.to_string(),
            sources: Vec::new(),
        }
    }
}

/// The retrieval-augmented answering service.
pub struct Chatbot {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    top_k: usize,
}

impl std::fmt::Debug for Chatbot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chatbot")
            .field("template", &self.template)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl Chatbot {
    /// Builds the service and validates that the index exists and was built
    /// with the same embedding model and dimension this instance will use.
    pub async fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        template: PromptTemplate,
        top_k: usize,
    ) -> Result<Self, PipelineError> {
        let chatbot = Self {
            embedder,
            index,
            generator,
            template,
            top_k,
        };
        chatbot.verify_index_compatibility().await?;
        tracing::info!(
            embed_model = chatbot.embedder.model_id(),
            llm_model = chatbot.generator.model_id(),
            top_k = chatbot.top_k,
            "chatbot ready"
        );
        Ok(chatbot)
    }

    /// Answers a question, never failing: errors become a degraded reply.
    pub async fn ask(&self, query: &str) -> ChatReply {
        match self.answer(query).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(error = %err, "query failed");
                ChatReply::degraded(&err)
            }
        }
    }

    /// The fallible query path. Empty or whitespace-only questions are
    /// passed through to the model unchanged.
    pub async fn answer(&self, query: &str) -> Result<ChatReply, PipelineError> {
        self.verify_index_compatibility().await?;

        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.query(&embedding, self.top_k).await?;
        tracing::debug!(query, hits = hits.len(), "retrieved context");

        let context = hits
            .iter()
            .map(|hit| hit.metadata.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = self.template.render(&context, query);
        let answer = self.generator.generate(&prompt).await?;

        let sources = hits
            .iter()
            .enumerate()
            .map(|(position, hit)| format_citation(position, hit))
            .collect();

        Ok(ChatReply { answer, sources })
    }

    /// Fails fast when the index was built with a different embedding model
    /// or dimension than this instance is configured with.
    async fn verify_index_compatibility(&self) -> Result<(), PipelineError> {
        let spec = self.index.spec().await?.ok_or_else(|| {
            PipelineError::Configuration(
                "index does not exist yet; run the index stage first".to_string(),
            )
        })?;
        if spec.model != self.embedder.model_id() {
            return Err(PipelineError::Configuration(format!(
                "index was built with embedding model '{}' but the service uses '{}'",
                spec.model,
                self.embedder.model_id()
            )));
        }
        if spec.dimension != self.embedder.dimension() {
            return Err(PipelineError::Configuration(format!(
                "index dimension is {} but embedding model '{}' produces {}-dimensional vectors",
                spec.dimension,
                self.embedder.model_id(),
                self.embedder.dimension()
            )));
        }
        Ok(())
    }
}

/// Formats one citation: 1-based position, source URL, and a truncated
/// single-line snippet of the chunk text.
pub fn format_citation(position: usize, hit: &ScoredChunk) -> String {
    let snippet: String = hit
        .metadata
        .text
        .replace('\n', " ")
        .chars()
        .take(SNIPPET_CHARS)
        .collect();
    format!(
        "Source {}: URL: {}, Content Snippet: \"{}...\"",
        position + 1,
        hit.metadata.source_url,
        snippet
    )
}
