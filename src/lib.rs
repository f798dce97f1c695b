//! ```text
//! Airport pages ──► ingestion::fetch ──► ingestion::clean ──► ingestion::chunk
//!                                                                  │
//!                                              chunk file (JSON) ◄─┘
//!                                                                  │
//! embeddings::EmbeddingProvider ──► embedded file (JSON) ◄─────────┘
//!                                            │
//! stores::VectorIndex ◄── batched upsert ────┘
//!          │
//!          └──► answer::Chatbot ── embed query ► search ► prompt ► generate
//!                      │
//!                      └──► server (POST /ask) ◄── chat client
//! ```
//!
//! Retrieval-augmented question answering over airport-website content.
//! The offline stages (harvest, embed, index) each consume the previous
//! stage's interchange file; the online stage answers questions against the
//! populated index and is exposed over HTTP.

pub mod answer;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod ingestion;
pub mod server;
pub mod stores;
pub mod telemetry;
pub mod types;

pub use answer::{ChatReply, Chatbot, PromptTemplate};
pub use types::{EmbeddedChunk, PipelineError, TextChunk};
