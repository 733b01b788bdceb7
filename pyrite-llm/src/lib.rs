//! # pyrite-llm
//!
//! The completion transport for pyrite.
//!
//! ## Core Concepts
//! - **ChatMessage/Role**: ordered `(role, content)` conversation entries
//! - **CompletionRequest**: one completion call - model, temperature, base URL,
//!   provider tag, streaming flag
//! - **Transport**: trait-based access to an OpenAI-compatible completion API
//! - **StreamReceiver**: incremental text chunks for streamed completions
//! - **Cost**: price-table estimation for completed calls

pub mod cost;
pub mod transport;

pub use cost::estimate_cost;
pub use transport::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmTransport, OpenAiTransport, Role,
    StreamChunk, StreamReceiver, TransportConfig,
};
