//! Audit logging for completion attempts
//!
//! Every completion attempt leaves exactly one JSON line in the log file,
//! whether the call succeeded or failed. The sink path is injected at
//! construction; each flush opens the file, appends one newline-terminated
//! object, and releases it.

use pyrite_error::{Error, Result};
use pyrite_llm::ChatMessage;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// One entry per completion attempt.
///
/// `response` and `cost` stay null until known; `error` appears only on
/// failure.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub model: String,
    pub prompt: String,
    pub response: Option<String>,
    pub cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogRecord {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            response: None,
            cost: None,
            error: None,
        }
    }
}

/// Metadata attached to a conversation dump
#[derive(Debug, Clone, Serialize)]
pub struct ConversationMetadata {
    pub model: String,
    pub cost: String,
}

/// The append-only log sink, plus an optional directory for full-transcript
/// dumps of successful calls.
pub struct SessionLog {
    log_path: PathBuf,
    conversation_dir: Option<PathBuf>,
}

impl SessionLog {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            conversation_dir: None,
        }
    }

    /// Also write the full transcript of each successful call into `dir`
    pub fn with_conversation_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.conversation_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Append exactly one JSON line for this record
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::io_failed(format!("Failed to create log directory: {}", e))
                        .with_operation("log::append")
                })?;
            }
        }

        let line = serde_json::to_string(record).map_err(|e| {
            Error::serialization_failed(e.to_string()).with_operation("log::append")
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                Error::io_failed(format!("Failed to open log file: {}", e))
                    .with_operation("log::append")
            })?;

        writeln!(file, "{}", line).map_err(|e| {
            Error::io_failed(format!("Failed to write log record: {}", e))
                .with_operation("log::append")
        })?;

        Ok(())
    }

    /// Write the full conversation as one timestamped JSON file.
    ///
    /// A no-op when no conversation directory is configured.
    pub fn dump_conversation(
        &self,
        messages: &[ChatMessage],
        metadata: &ConversationMetadata,
    ) -> Result<()> {
        let Some(dir) = &self.conversation_dir else {
            return Ok(());
        };

        fs::create_dir_all(dir).map_err(|e| {
            Error::io_failed(format!("Failed to create conversation directory: {}", e))
                .with_operation("log::dump_conversation")
        })?;

        let path = dir.join(format!("conversation_{}.json", timestamp_millis()));
        let dump = serde_json::json!({
            "metadata": metadata,
            "messages": messages,
        });
        let json = serde_json::to_string_pretty(&dump).map_err(|e| {
            Error::serialization_failed(e.to_string()).with_operation("log::dump_conversation")
        })?;

        fs::write(&path, json).map_err(|e| {
            Error::io_failed(format!("Failed to write conversation dump: {}", e))
                .with_operation("log::dump_conversation")
        })?;

        Ok(())
    }
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::new(dir.path().join("conversation.jsonl"));

        let mut record = LogRecord::new("gpt-4o", "list my files");
        record.response = Some("```python\nprint('x')\n```".into());
        record.cost = Some("0.0000123000".into());
        log.append(&record).unwrap();
        log.append(&record).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["model"], "gpt-4o");
        assert_eq!(parsed["prompt"], "list my files");
        assert_eq!(parsed["cost"], "0.0000123000");
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn test_append_failure_record() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::new(dir.path().join("conversation.jsonl"));

        let mut record = LogRecord::new("gpt-4o", "list my files");
        record.error = Some("connection refused".into());
        log.append(&record).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["error"], "connection refused");
        assert!(parsed["response"].is_null());
        assert!(parsed["cost"].is_null());
    }

    #[test]
    fn test_append_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::new(dir.path().join("nested").join("conversation.jsonl"));

        log.append(&LogRecord::new("gpt-4o", "hello")).unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn test_dump_conversation() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::new(dir.path().join("conversation.jsonl"))
            .with_conversation_dir(dir.path().join("conversations"));

        let messages = vec![
            ChatMessage::system("You write python scripts."),
            ChatMessage::user("print hello"),
            ChatMessage::assistant("```python\nprint('hello')\n```"),
        ];
        let metadata = ConversationMetadata {
            model: "gpt-4o".into(),
            cost: "0.000010000".into(),
        };
        log.dump_conversation(&messages, &metadata).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path().join("conversations"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);

        let content = fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["metadata"]["model"], "gpt-4o");
        assert_eq!(parsed["messages"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_dump_without_directory_is_noop() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::new(dir.path().join("conversation.jsonl"));

        let metadata = ConversationMetadata {
            model: "gpt-4o".into(),
            cost: "0.0000000000".into(),
        };
        log.dump_conversation(&[], &metadata).unwrap();
        assert!(!log.path().exists());
    }
}
