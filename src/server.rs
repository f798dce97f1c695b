//! HTTP front door for the answering pipeline.
//!
//! One endpoint: `POST /ask` takes `{"query": ...}` and returns
//! `{"answer": ..., "sources": [...]}`, always with status 200, degraded
//! answers included. `GET /` serves a static welcome payload.
//!
//! The service object is injected through [`AppState`]. When pipeline
//! initialization failed at startup the state carries no chatbot and every
//! request gets the fixed not-ready reply instead of an HTTP error; the
//! process stays up so it can be probed and restarted deliberately.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::answer::{ChatReply, Chatbot};

/// Shared request-handler state: the chatbot, or `None` when startup
/// initialization failed.
#[derive(Clone)]
pub struct AppState {
    chatbot: Option<Arc<Chatbot>>,
}

impl AppState {
    pub fn ready(chatbot: Arc<Chatbot>) -> Self {
        Self {
            chatbot: Some(chatbot),
        }
    }

    pub fn not_ready() -> Self {
        Self { chatbot: None }
    }

    pub fn is_ready(&self) -> bool {
        self.chatbot.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/ask", post(ask))
        .with_state(state)
}

/// Serves the router until the process exits.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state).into_make_service()).await
}

async fn welcome() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the airport chatbot API! POST a question to /ask.",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Json<ChatReply> {
    let Some(chatbot) = &state.chatbot else {
        return Json(ChatReply::not_ready());
    };
    Json(chatbot.ask(&request.query).await)
}
