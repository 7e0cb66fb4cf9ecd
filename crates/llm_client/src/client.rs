use std::time::Duration;

use serde::{Deserialize, Serialize};
use tallyguard_recon::{GenerationError, TextGenerator};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "mistral";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}: {1}")]
    Http(u16, String),
    #[error("unexpected response: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    /// Base URL, without the `/api/...` path.
    pub endpoint: String,
    pub model: String,
    /// Applies to each request on its own.
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            model: DEFAULT_MODEL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

/// Chat client (blocking). Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("tguard/{}", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one user message and return the reply text.
    pub fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Http(status, error_message(&body)));
        }

        let reply: ChatResponse = response
            .json()
            .map_err(|e| transport_error(&url, e))?;
        reply
            .message
            .map(|m| m.content)
            .ok_or_else(|| LlmError::Parse("missing 'message' in chat response".into()))
    }

    /// Reachability check against `/api/tags`.
    pub fn ping(&self) -> Result<(), LlmError> {
        let url = format!("{}/api/tags", self.endpoint);
        let response = self.http.get(&url).send().map_err(|e| transport_error(&url, e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            Err(LlmError::Http(status, error_message(&response.text().unwrap_or_default())))
        }
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.chat(prompt).map_err(|e| match e {
            LlmError::Timeout(_) => GenerationError::Timeout(e.to_string()),
            other => GenerationError::Failed(other.to_string()),
        })
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(url.to_string())
    } else if e.is_decode() {
        LlmError::Parse(e.to_string())
    } else {
        LlmError::Network(e.to_string())
    }
}

/// Ollama reports failures as `{"error": "..."}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
