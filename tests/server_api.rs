//! HTTP front-door tests: a real axum server on an ephemeral port, driven
//! with reqwest.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use concourse::answer::{ChatReply, Chatbot, NOT_READY_ANSWER, PromptTemplate};
use concourse::embeddings::{EmbeddingProvider, MockEmbeddingProvider};
use concourse::generation::MockGenerator;
use concourse::server::{self, AppState};
use concourse::stores::{
    ChunkMetadata, IndexEntry, IndexSpec, MemoryVectorIndex, Metric, ScoredChunk, VectorIndex,
};
use concourse::types::PipelineError;

const DIMENSION: usize = 16;
const JEWEL_URL: &str = "https://jewelchangiairport.com/";

async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server::serve(listener, state).await;
    });
    addr
}

fn test_spec() -> IndexSpec {
    IndexSpec {
        name: "airport-chunks".to_string(),
        dimension: DIMENSION,
        metric: Metric::Cosine,
        model: "mock-embedder".to_string(),
    }
}

async fn ready_state() -> AppState {
    let embedder = MockEmbeddingProvider::with_dimension(DIMENSION);
    let index = Arc::new(MemoryVectorIndex::new());
    index.ensure(&test_spec()).await.unwrap();

    let text = "Jewel Changi has a rain vortex.";
    let vector = embedder.embed(text).await.unwrap();
    index
        .upsert(&[IndexEntry {
            id: format!("{JEWEL_URL}_0"),
            vector,
            metadata: ChunkMetadata {
                text: text.to_string(),
                source_url: JEWEL_URL.to_string(),
                chunk_index: 0,
            },
        }])
        .await
        .unwrap();

    let chatbot = Chatbot::new(
        Arc::new(embedder),
        index,
        Arc::new(MockGenerator::echo()),
        PromptTemplate::airport_default(),
        3,
    )
    .await
    .unwrap();
    AppState::ready(Arc::new(chatbot))
}

#[tokio::test]
async fn welcome_payload_carries_the_version() {
    let addr = spawn_server(AppState::not_ready()).await;

    let body: Value = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body["message"].as_str().unwrap().contains("Welcome"));
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn not_ready_server_answers_with_the_fixed_reply() {
    let addr = spawn_server(AppState::not_ready()).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/ask"))
        .json(&json!({ "query": "What is at Jewel Changi?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let reply: ChatReply = response.json().await.unwrap();
    assert_eq!(reply.answer, NOT_READY_ANSWER);
    assert!(reply.sources.is_empty());
}

#[tokio::test]
async fn ready_server_answers_with_sources() {
    let addr = spawn_server(ready_state().await).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/ask"))
        .json(&json!({ "query": "What is at Jewel Changi?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let reply: ChatReply = response.json().await.unwrap();
    assert!(reply.answer.contains("rain vortex"));
    assert_eq!(reply.sources.len(), 1);
    assert!(reply.sources[0].contains(JEWEL_URL));
}

/// Index double whose query path always fails.
struct UnreachableIndex;

#[async_trait]
impl VectorIndex for UnreachableIndex {
    async fn ensure(&self, _spec: &IndexSpec) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn upsert(&self, _entries: &[IndexEntry]) -> Result<(), PipelineError> {
        Err(PipelineError::Index("store unreachable".to_string()))
    }

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        Err(PipelineError::Index("store unreachable".to_string()))
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        Ok(0)
    }

    async fn spec(&self) -> Result<Option<IndexSpec>, PipelineError> {
        Ok(Some(test_spec()))
    }
}

#[tokio::test]
async fn degraded_answers_keep_http_status_200() {
    let chatbot = Chatbot::new(
        Arc::new(MockEmbeddingProvider::with_dimension(DIMENSION)),
        Arc::new(UnreachableIndex),
        Arc::new(MockGenerator::echo()),
        PromptTemplate::airport_default(),
        3,
    )
    .await
    .unwrap();
    let addr = spawn_server(AppState::ready(Arc::new(chatbot))).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/ask"))
        .json(&json!({ "query": "What is at Jewel Changi?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let reply: ChatReply = response.json().await.unwrap();
    assert!(
        reply
            .answer
            .starts_with("An error occurred while processing your request:")
    );
    assert!(reply.sources.is_empty());
}
