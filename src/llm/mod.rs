//! Inference collaborator — a chat seam over a locally hosted Ollama endpoint.
//!
//! The pipeline only ever needs one operation: system prompt + user content
//! in, completion text out. Everything else (retries, cleanup, batching) is
//! pipeline policy and lives with the callers.

pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Text-to-text inference seam.
///
/// Implementations are expected to serialize requests. The local endpoint
/// handles one completion at a time, and the pipeline never issues two
/// concurrently.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One chat completion: returns the trimmed assistant message.
    async fn chat(
        &self,
        model: &str,
        system_prompt: &str,
        user_content: &str,
        context_size: u32,
    ) -> Result<String, LlmError>;
}

// ── Ollama ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    options: ChatOptions,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_ctx: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Client for the Ollama `/api/chat` endpoint.
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    /// Create a client against e.g. `http://localhost:11434`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn chat_endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(
        &self,
        model: &str,
        system_prompt: &str,
        user_content: &str,
        context_size: u32,
    ) -> Result<String, LlmError> {
        let endpoint = self.chat_endpoint();
        let request = ChatRequest {
            model,
            stream: false,
            options: ChatOptions {
                num_ctx: context_size,
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
        };

        let response = self
            .http
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LlmError::RequestFailed {
                endpoint,
                reason: format!("HTTP {}", response.status()),
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse {
                    model: model.to_string(),
                    reason: e.to_string(),
                })?;

        let content = parsed.message.content.trim().to_string();
        if content.is_empty() {
            return Err(LlmError::EmptyCompletion {
                model: model.to_string(),
            });
        }

        tracing::debug!(model, chars = content.len(), "Chat completion received");
        Ok(content)
    }
}
