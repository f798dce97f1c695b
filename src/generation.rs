//! Language-model clients used to turn a grounded prompt into an answer.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::types::PipelineError;

/// Produces freeform text from a fully assembled prompt.
///
/// No streaming and no token-level control: the pipeline hands over one
/// prompt string and receives one answer string.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identifier of the underlying model, e.g. `mistral`.
    fn model_id(&self) -> &str;

    /// Generates a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Generator backed by Ollama's `/api/generate` endpoint.
#[derive(Clone, Debug)]
pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(client: Client, base_url: &Url, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/generate", base_url.as_str().trim_end_matches('/')),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let generation_err =
            |err: reqwest::Error| PipelineError::Generation(format!("{}: {err}", self.model));
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "model": self.model, "prompt": prompt, "stream": false }))
            .send()
            .await
            .map_err(generation_err)?
            .error_for_status()
            .map_err(generation_err)?;
        let body: OllamaGenerateResponse = response.json().await.map_err(generation_err)?;
        Ok(body.response)
    }
}

/// Test generator that either returns a canned reply or echoes the prompt.
///
/// Echoing makes grounding assertions possible: whatever context the
/// pipeline assembled is visible in the "answer".
#[derive(Clone, Debug)]
pub struct MockGenerator {
    reply: Option<String>,
}

impl MockGenerator {
    /// Always answers with `reply`.
    pub fn canned(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }

    /// Answers with the prompt itself.
    pub fn echo() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn model_id(&self) -> &str {
        "mock-generator"
    }

    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        Ok(self
            .reply
            .clone()
            .unwrap_or_else(|| prompt.to_string()))
    }
}
