//! Conversation session - completion calls, cost accounting, audit flushes
//!
//! One session owns one transcript. Every call submits the full transcript,
//! appends the assistant's reply, and leaves exactly one audit record behind,
//! success or failure.

use crate::log::{ConversationMetadata, LogRecord, SessionLog};
use crate::parse::{parse_reply, ParsedReply};
use pyrite_error::{Error, Result};
use pyrite_llm::{estimate_cost, ChatMessage, CompletionRequest, LlmTransport, StreamChunk};
use std::io::Write;

/// Configuration for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub temperature: f32,
    pub base_url: Option<String>,
    /// Backend tag for providers outside the built-in cost table; when set,
    /// cost is recorded as zero
    pub custom_provider: Option<String>,
    pub api_key: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 1.0,
            base_url: None,
            custom_provider: None,
            api_key: None,
        }
    }
}

/// A conversation session over one transport.
///
/// The transcript is append-only and owned exclusively by this session: the
/// next user prompt and the next assistant reply are the only mutations, and
/// nothing is ever pruned or rewritten.
pub struct ConversationSession<T: LlmTransport> {
    transport: T,
    config: SessionConfig,
    conversation: Vec<ChatMessage>,
    log: SessionLog,
}

impl<T: LlmTransport> ConversationSession<T> {
    /// Create a session seeded with system-role entries (task instructions,
    /// worked examples, environment description). Seed entries are never
    /// removed.
    pub fn new(
        transport: T,
        config: SessionConfig,
        system_entries: Vec<ChatMessage>,
        log: SessionLog,
    ) -> Self {
        resolve_openai_api_key(&config);
        Self {
            transport,
            config,
            conversation: system_entries,
            log,
        }
    }

    /// The full transcript so far
    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Ask the model for the next script.
    ///
    /// Appends `prompt` (when given) as a user entry, runs one completion over
    /// the full transcript, and splits the reply into message and script. A
    /// transport failure propagates after the audit record is flushed; a reply
    /// that merely fails script validation is a normal return whose message
    /// explains why nothing will run.
    pub async fn request(&mut self, prompt: Option<&str>, stream: bool) -> Result<ParsedReply> {
        if let Some(prompt) = prompt {
            self.conversation.push(ChatMessage::user(prompt));
        }
        let response = self.get_response(stream).await?;
        Ok(parse_reply(&response))
    }

    /// Run one completion over the transcript and record the attempt.
    ///
    /// The audit record is flushed on every exit path before this function
    /// returns; a transport failure takes precedence over a log-write failure.
    async fn get_response(&mut self, stream: bool) -> Result<String> {
        let mut record = LogRecord::new(
            self.config.model.as_str(),
            self.conversation
                .last()
                .map(|m| m.content.as_str())
                .unwrap_or_default(),
        );

        let outcome = self.complete(stream).await;
        let mut dump = None;
        match &outcome {
            Ok(text) => {
                let cost = if self.config.custom_provider.is_some() {
                    0.0
                } else {
                    estimate_cost(&self.config.model, &self.conversation, text).unwrap_or(0.0)
                };
                let cost = format!("{:.10}", cost);

                self.conversation.push(ChatMessage::assistant(text.clone()));
                record.response = Some(text.clone());
                record.cost = Some(cost.clone());
                dump = Some(ConversationMetadata {
                    model: self.config.model.clone(),
                    cost,
                });
            }
            Err(err) => {
                record.error = Some(err.to_string());
                eprintln!("Error:\n{:?}", record);
            }
        }

        let flushed = self.log.append(&record);
        let text = outcome?;
        flushed?;

        if let Some(metadata) = dump {
            self.log.dump_conversation(&self.conversation, &metadata)?;
        }

        Ok(text)
    }

    async fn complete(&self, stream: bool) -> Result<String> {
        let mut request = CompletionRequest::new(self.conversation.clone())
            .with_model(self.config.model.clone())
            .with_temperature(self.config.temperature)
            .with_streaming(stream);
        if let Some(base_url) = &self.config.base_url {
            request = request.with_base_url(base_url.clone());
        }
        if let Some(provider) = &self.config.custom_provider {
            request = request.with_custom_provider(provider.clone());
        }

        if stream {
            let mut receiver = self.transport.stream(request).await?;
            let mut text = String::new();
            while let Some(chunk) = receiver.next().await {
                match chunk {
                    StreamChunk::Text(delta) => {
                        print!("{}", delta);
                        std::io::stdout().flush().ok();
                        text.push_str(&delta);
                    }
                    StreamChunk::Done => break,
                    StreamChunk::Error(e) => {
                        return Err(Error::network_failed(e).with_operation("session::complete"))
                    }
                }
            }
            Ok(text)
        } else {
            let response = self.transport.complete(request).await?;
            Ok(response.content.unwrap_or_default())
        }
    }
}

/// The default OpenAI case is the only one with key discovery: a configured
/// key is pushed into the environment for the transport to pick up at call
/// time, and a missing key gets a non-fatal advisory.
fn resolve_openai_api_key(config: &SessionConfig) {
    if !config.model.contains("gpt-") {
        return;
    }

    let env_api_key = std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());
    if let Some(api_key) = &config.api_key {
        std::env::set_var("OPENAI_API_KEY", api_key);
    } else if env_api_key.is_none() {
        println!(
            "It looks like you're using a GPT model without an API key. \
             You can add your API key by setting the OPENAI_API_KEY environment \
             variable or by putting an api_key in the session configuration. \
             If this was intentional, you can ignore this message."
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyrite_llm::{CompletionResponse, StreamReceiver};
    use tempfile::TempDir;

    /// Transport that always replies with the same text
    struct FixedTransport {
        reply: String,
    }

    impl FixedTransport {
        fn new(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
            }
        }
    }

    impl LlmTransport for FixedTransport {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                model: "gpt-4o".into(),
                content: Some(self.reply.clone()),
            })
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<StreamReceiver> {
            // Deliver the reply in small chunks to exercise reassembly
            let chunks: Vec<String> = self
                .reply
                .as_bytes()
                .chunks(5)
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect();
            Ok(StreamReceiver::new(async_stream::stream! {
                for chunk in chunks {
                    yield StreamChunk::Text(chunk);
                }
                yield StreamChunk::Done;
            }))
        }
    }

    /// Transport that always fails
    struct FailingTransport;

    impl LlmTransport for FailingTransport {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Err(Error::network_failed("connection refused")
                .with_operation("transport::complete"))
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<StreamReceiver> {
            Err(Error::network_failed("connection refused").with_operation("transport::stream"))
        }
    }

    fn session<T: LlmTransport>(
        transport: T,
        dir: &TempDir,
        config: SessionConfig,
    ) -> ConversationSession<T> {
        let log = SessionLog::new(dir.path().join("conversation.jsonl"));
        ConversationSession::new(
            transport,
            config,
            vec![ChatMessage::system("You write python scripts.")],
            log,
        )
    }

    fn log_lines(dir: &TempDir) -> Vec<serde_json::Value> {
        let content =
            std::fs::read_to_string(dir.path().join("conversation.jsonl")).unwrap_or_default();
        content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_request_success() {
        let dir = TempDir::new().unwrap();
        let mut session = session(
            FixedTransport::new("Sure:```python\nprint('hi')\n```done"),
            &dir,
            SessionConfig::default(),
        );

        let reply = session.request(Some("say hi"), false).await.unwrap();
        assert_eq!(reply.script(), Some("print('hi')"));

        // system + user + assistant
        assert_eq!(session.conversation().len(), 3);
        assert_eq!(session.conversation()[1].content, "say hi");
        assert_eq!(
            session.conversation()[2].content,
            "Sure:```python\nprint('hi')\n```done"
        );

        let lines = log_lines(&dir);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["model"], "gpt-4o");
        assert_eq!(lines[0]["prompt"], "say hi");
        assert!(lines[0]["response"].is_string());
        assert!(lines[0]["cost"].is_string());
        assert!(lines[0].get("error").is_none());
    }

    #[tokio::test]
    async fn test_request_failure_still_logs() {
        let dir = TempDir::new().unwrap();
        let mut session = session(FailingTransport, &dir, SessionConfig::default());

        let err = session.request(Some("say hi"), false).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));

        // prompt appended, no assistant entry
        assert_eq!(session.conversation().len(), 2);

        let lines = log_lines(&dir);
        assert_eq!(lines.len(), 1);
        assert!(lines[0]["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
        assert!(lines[0]["response"].is_null());
        assert!(lines[0]["cost"].is_null());
    }

    #[tokio::test]
    async fn test_request_without_prompt() {
        let dir = TempDir::new().unwrap();
        let mut session = session(
            FixedTransport::new("no code this time"),
            &dir,
            SessionConfig::default(),
        );

        let reply = session.request(None, false).await.unwrap();
        assert_eq!(reply.message(), "no code this time");
        assert_eq!(reply.script(), None);

        // system + assistant only
        assert_eq!(session.conversation().len(), 2);
    }

    #[tokio::test]
    async fn test_custom_provider_cost_is_zero() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig {
            model: "local-llama".into(),
            custom_provider: Some("ollama".into()),
            base_url: Some("http://localhost:11434/v1".into()),
            ..Default::default()
        };
        let mut session = session(
            FixedTransport::new("```python\nprint(1)\n```"),
            &dir,
            config,
        );

        session.request(Some("go"), false).await.unwrap();

        let lines = log_lines(&dir);
        assert_eq!(lines[0]["cost"], "0.0000000000");
    }

    #[tokio::test]
    async fn test_unknown_model_cost_is_zero() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig {
            model: "some-unpriced-model".into(),
            ..Default::default()
        };
        let mut session = session(FixedTransport::new("hello"), &dir, config);

        session.request(Some("go"), false).await.unwrap();

        let lines = log_lines(&dir);
        assert_eq!(lines[0]["cost"], "0.0000000000");
    }

    #[tokio::test]
    async fn test_streaming_assembles_full_reply() {
        let dir = TempDir::new().unwrap();
        let mut session = session(
            FixedTransport::new("Sure:```python\nprint('hi')\n```done"),
            &dir,
            SessionConfig::default(),
        );

        let reply = session.request(Some("say hi"), true).await.unwrap();
        assert_eq!(reply.script(), Some("print('hi')"));

        // chunks were reassembled into one assistant entry
        assert_eq!(session.conversation().len(), 3);
        assert_eq!(
            session.conversation()[2].content,
            "Sure:```python\nprint('hi')\n```done"
        );
        assert_eq!(log_lines(&dir).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_script_is_normal_return() {
        let dir = TempDir::new().unwrap();
        let mut session = session(
            FixedTransport::new("```python\ndef f(:\n```"),
            &dir,
            SessionConfig::default(),
        );

        let reply = session.request(Some("go"), false).await.unwrap();
        assert!(reply.message().contains("invalid Python"));
        assert_eq!(reply.script(), None);

        // the raw reply is still recorded and appended
        assert_eq!(session.conversation().len(), 3);
        assert_eq!(log_lines(&dir).len(), 1);
    }

    #[tokio::test]
    async fn test_conversation_dump_on_success() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::new(dir.path().join("conversation.jsonl"))
            .with_conversation_dir(dir.path().join("conversations"));
        let mut session = ConversationSession::new(
            FixedTransport::new("fine"),
            SessionConfig::default(),
            vec![ChatMessage::system("You write python scripts.")],
            log,
        );

        session.request(Some("go"), false).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("conversations"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
