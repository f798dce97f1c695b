//! Serve stage: expose the answering pipeline over HTTP.
//!
//! The pipeline is constructed once at startup. If construction fails the
//! server still binds and serves the fixed not-ready reply on every request,
//! so a misconfigured deployment is observable rather than crash-looping.

use std::sync::Arc;

use tokio::net::TcpListener;

use concourse::answer::{Chatbot, PromptTemplate};
use concourse::config::{self, ServiceConfig};
use concourse::embeddings::OllamaEmbedder;
use concourse::generation::OllamaGenerator;
use concourse::server::{self, AppState};
use concourse::stores::SqliteVectorIndex;
use concourse::telemetry::init_tracing;
use concourse::types::PipelineError;

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    init_tracing();

    let state = match build_chatbot().await {
        Ok(chatbot) => AppState::ready(chatbot),
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize chatbot; serving not-ready replies");
            AppState::not_ready()
        }
    };

    let addr = config::bind_addr_from_env()?;
    let listener = TcpListener::bind(addr).await?;
    println!(
        "Listening on http://{} ({})",
        listener.local_addr()?,
        if state.is_ready() { "ready" } else { "not ready" }
    );

    server::serve(listener, state).await?;
    Ok(())
}

async fn build_chatbot() -> Result<Arc<Chatbot>, PipelineError> {
    let config = ServiceConfig::from_env()?;

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .build()
        .map_err(|err| {
            PipelineError::Configuration(format!("failed to build HTTP client: {err}"))
        })?;

    let embedder = OllamaEmbedder::connect(
        client.clone(),
        &config.ollama_url,
        config.embed_model.clone(),
        config.dimension,
    )
    .await?;
    let index = SqliteVectorIndex::open(&config.index_db).await?;
    let generator = OllamaGenerator::new(client, &config.ollama_url, config.llm_model.clone());

    let chatbot = Chatbot::new(
        Arc::new(embedder),
        Arc::new(index),
        Arc::new(generator),
        PromptTemplate::airport_default(),
        config.top_k,
    )
    .await?;
    Ok(Arc::new(chatbot))
}
