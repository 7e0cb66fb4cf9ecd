//! Text-generation client for row comments.
//!
//! Blocking reqwest client (no Tokio runtime required) against an
//! Ollama-compatible `/api/chat` endpoint.

mod client;

pub use client::{LlmError, LlmSettings, OllamaClient, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
