//! HTTP-level coverage of the Ollama-backed providers against a mock server.

use httpmock::prelude::*;
use reqwest::Client;
use serde_json::json;
use url::Url;

use concourse::embeddings::{EmbeddingProvider, OllamaEmbedder};
use concourse::generation::{Generator, OllamaGenerator};
use concourse::types::PipelineError;

fn base_url(server: &MockServer) -> Url {
    Url::parse(&server.base_url()).unwrap()
}

#[tokio::test]
async fn embedder_probes_on_connect_and_embeds() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/embeddings")
                .json_body_partial(r#"{"model": "all-minilm"}"#);
            then.status(200)
                .json_body(json!({ "embedding": [0.1, 0.2, 0.3, 0.4] }));
        })
        .await;

    let embedder = OllamaEmbedder::connect(Client::new(), &base_url(&server), "all-minilm", 4)
        .await
        .unwrap();
    assert_eq!(embedder.model_id(), "all-minilm");
    assert_eq!(embedder.dimension(), 4);

    let vector = embedder.embed("rain vortex").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3, 0.4]);

    // One warm-up probe plus one real embed.
    mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn unreachable_model_fails_connect_with_model_load() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(500).body("model not found");
        })
        .await;

    let err = OllamaEmbedder::connect(Client::new(), &base_url(&server), "all-minilm", 4)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ModelLoad { .. }));
}

#[tokio::test]
async fn probe_with_unexpected_dimension_is_a_configuration_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(200).json_body(json!({ "embedding": [0.1, 0.2] }));
        })
        .await;

    let err = OllamaEmbedder::connect(Client::new(), &base_url(&server), "all-minilm", 4)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
}

#[tokio::test]
async fn generator_posts_prompt_and_returns_response() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body_partial(r#"{"model": "mistral", "stream": false}"#);
            then.status(200).json_body(json!({
                "response": "The rain vortex is the world's tallest indoor waterfall.",
                "done": true,
            }));
        })
        .await;

    let generator = OllamaGenerator::new(Client::new(), &base_url(&server), "mistral");
    assert_eq!(generator.model_id(), "mistral");

    let answer = generator.generate("What is the rain vortex?").await.unwrap();
    assert!(answer.contains("indoor waterfall"));
    mock.assert_async().await;
}

#[tokio::test]
async fn generator_failure_is_a_generation_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(500).body("boom");
        })
        .await;

    let generator = OllamaGenerator::new(Client::new(), &base_url(&server), "mistral");
    let err = generator.generate("anything").await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
}
