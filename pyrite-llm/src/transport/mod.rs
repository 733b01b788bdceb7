//! # Completion Transport Interface
//!
//! A trait-based abstraction for communicating with an LLM completion backend.
//! Supports plain and streamed completions.
//!
//! ## Design
//! - `LlmTransport` trait defines the core interface
//! - `OpenAiTransport` implements it for OpenAI-compatible APIs (OpenAI,
//!   Azure OpenAI, vLLM, Ollama, local gateways via `base_url`)
//! - Streaming via an async chunk sequence; the full text exists only once
//!   the sequence is exhausted

pub mod openai;

pub use openai::OpenAiTransport;

use pyrite_error::Result;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

// ============================================================================
// Core Types
// ============================================================================

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Request parameters for a completion.
///
/// The base URL and provider tag travel on the request rather than the
/// transport: one session may point successive calls at different gateways.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub base_url: Option<String>,
    pub custom_provider: Option<String>,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_custom_provider(mut self, provider: impl Into<String>) -> Self {
        self.custom_provider = Some(provider.into());
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub model: String,
    pub content: Option<String>,
}

/// A streaming chunk from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Text content delta
    Text(String),
    /// Stream finished
    Done,
    /// The byte stream broke mid-completion
    Error(String),
}

// ============================================================================
// Transport Trait
// ============================================================================

/// The completion transport trait.
///
/// One completion request is outstanding at a time per caller; both methods
/// block their caller until the response (or the full stream) is available.
#[allow(async_fn_in_trait)]
pub trait LlmTransport: Send + Sync {
    /// Get the transport name (e.g., "openai")
    fn name(&self) -> &str;

    /// Send a completion request and get a full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Send a completion request and stream the response
    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver>;
}

/// Receiver for streaming responses.
///
/// Chunks are consumed one at a time with [`next`](Self::next); the completion
/// text is only whole once `Done` (or the end of the sequence) is reached.
pub struct StreamReceiver {
    inner: Pin<Box<dyn futures_core::Stream<Item = StreamChunk> + Send>>,
}

impl StreamReceiver {
    pub fn new<S>(stream: S) -> Self
    where
        S: futures_core::Stream<Item = StreamChunk> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Await the next chunk, or `None` when the stream is exhausted
    pub async fn next(&mut self) -> Option<StreamChunk> {
        use futures_util::StreamExt;
        self.inner.next().await
    }

    /// Collect all text chunks into a single string
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            match chunk {
                StreamChunk::Text(t) => text.push_str(&t),
                StreamChunk::Done => break,
                StreamChunk::Error(e) => {
                    return Err(pyrite_error::Error::network_failed(e)
                        .with_operation("transport::collect_text"))
                }
            }
        }
        Ok(text)
    }
}

// ============================================================================
// Transport Configuration
// ============================================================================

/// Configuration for creating a transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Explicit API key; when absent the transport falls back to the
    /// `OPENAI_API_KEY` environment variable at call time
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_secs: Some(120),
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
