//! Embed stage: read the chunk file, embed every chunk with the configured
//! model, and write the embedded interchange file.
//!
//! A model that cannot be loaded fails the whole run; there is no
//! partial-success mode.

use concourse::config::EmbedConfig;
use concourse::embeddings::{self, OllamaEmbedder};
use concourse::telemetry::init_tracing;
use concourse::types::{self, PipelineError};

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    init_tracing();
    let config = EmbedConfig::from_env()?;

    let chunks = match types::read_chunks(&config.chunks_file).await {
        Ok(chunks) => chunks,
        Err(PipelineError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::Configuration(format!(
                "{} not found; run the harvest stage first",
                config.chunks_file.display()
            )));
        }
        Err(err) => return Err(err),
    };
    if chunks.is_empty() {
        println!("No chunks found in {}; nothing to embed.", config.chunks_file.display());
        return Ok(());
    }

    println!(
        "Loading embedding model '{}' ({}-dimensional)...",
        config.embed_model, config.dimension
    );
    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .build()
        .map_err(|err| {
            PipelineError::Configuration(format!("failed to build HTTP client: {err}"))
        })?;
    let embedder = OllamaEmbedder::connect(
        client,
        &config.ollama_url,
        config.embed_model.clone(),
        config.dimension,
    )
    .await?;

    let total = chunks.len();
    let embedded = embeddings::embed_chunks(&embedder, chunks).await?;
    types::write_embedded(&config.embedded_file, &embedded).await?;

    println!(
        "Embedded {} chunk(s); saved to {}",
        total,
        config.embedded_file.display()
    );
    Ok(())
}
