//! OpenAI-compatible transport implementation
//!
//! Works with OpenAI, Azure OpenAI, vLLM, Ollama, and other OpenAI-compatible
//! APIs. Custom backends are reached by setting `base_url` on the request.

use super::*;
use pyrite_error::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI-compatible transport
pub struct OpenAiTransport {
    client: Client,
    config: TransportConfig,
}

impl OpenAiTransport {
    pub fn new(config: TransportConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.unwrap_or(120)))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// The key sent as a bearer token: explicit config first, then the
    /// `OPENAI_API_KEY` environment variable at call time.
    fn api_key(&self) -> Option<String> {
        self.config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> reqwest::RequestBuilder {
        let base_url = request.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let api_request = OpenAiRequest {
            model: request.model.clone().unwrap_or_else(|| DEFAULT_MODEL.into()),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            stream: Some(stream),
        };

        let mut req = self
            .client
            .post(format!("{}/chat/completions", base_url))
            .json(&api_request);

        if let Some(api_key) = self.api_key() {
            if !api_key.is_empty() {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }
        }

        req
    }
}

impl LlmTransport for OpenAiTransport {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = self
            .build_request(&request, false)
            .send()
            .await
            .map_err(|e| {
                Error::network_failed(e.to_string())
                    .with_operation("transport::complete")
                    .set_source(e)
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text).with_operation("transport::complete"));
        }

        let api_response: OpenAiResponse = response.json().await.map_err(|e| {
            Error::parse_failed(e.to_string())
                .with_operation("transport::complete")
                .set_source(e)
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::parse_failed("no choices in response").with_operation("transport::complete")
            })?;

        Ok(CompletionResponse {
            model: api_response.model,
            content: choice.message.content,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver> {
        let response = self
            .build_request(&request, true)
            .send()
            .await
            .map_err(|e| {
                Error::network_failed(e.to_string())
                    .with_operation("transport::stream")
                    .set_source(e)
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text).with_operation("transport::stream"));
        }

        // Decode SSE events into chunks as bytes arrive
        let stream = async_stream::stream! {
            use futures_util::StreamExt;

            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        // Process complete SSE events
                        while let Some(pos) = buffer.find("\n\n") {
                            let event = buffer[..pos].to_string();
                            buffer = buffer[pos + 2..].to_string();

                            for line in event.lines() {
                                if let Some(data) = line.strip_prefix("data: ") {
                                    if let Some(chunk) = decode_stream_data(data) {
                                        let done = chunk == StreamChunk::Done;
                                        yield chunk;
                                        if done {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield StreamChunk::Error(e.to_string());
                        return;
                    }
                }
            }
        };

        Ok(StreamReceiver::new(stream))
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: u16, body: String) -> Error {
    match status {
        429 => Error::rate_limited(),
        401 => Error::authentication_failed(),
        404 => Error::new(pyrite_error::ErrorKind::ModelNotFound, body),
        _ => Error::transport_failed(status, body),
    }
}

/// Decode one SSE `data:` payload into a stream chunk
fn decode_stream_data(data: &str) -> Option<StreamChunk> {
    if data == "[DONE]" {
        return Some(StreamChunk::Done);
    }

    let chunk: OpenAiStreamChunk = serde_json::from_str(data).ok()?;
    let choice = chunk.choices.into_iter().next()?;

    if let Some(content) = choice.delta.content {
        return Some(StreamChunk::Text(content));
    }
    if choice.finish_reason.is_some() {
        return Some(StreamChunk::Done);
    }
    None
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: match msg.role {
                Role::System => "system".into(),
                Role::User => "user".into(),
                Role::Assistant => "assistant".into(),
            },
            content: Some(msg.content.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}
