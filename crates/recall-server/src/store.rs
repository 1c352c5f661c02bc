//! JSONL-file message log: one append-only file per conversation

use async_trait::async_trait;
use recall_ai::Message;
use recall_engine::{ConversationId, Error, MessageLog, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Log entry types for the JSONL format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    /// A message in the conversation
    Message { message: Message },
    /// A replacement for the running summary
    Summary { summary: String, timestamp: i64 },
}

/// Message log persisted as JSONL files under one directory
pub struct JsonlMessageLog {
    dir: PathBuf,
}

impl JsonlMessageLog {
    /// Open a log rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, conversation: &ConversationId) -> PathBuf {
        self.dir
            .join(format!("{}.jsonl", encode_file_stem(conversation.as_str())))
    }

    async fn append_entry(&self, conversation: &ConversationId, entry: &LogEntry) -> Result<()> {
        let path = self.path_for(conversation);
        let mut line = serde_json::to_string(entry).map_err(|e| log_error(&path, e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| log_error(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| log_error(&path, e))?;
        file.flush().await.map_err(|e| log_error(&path, e))?;
        Ok(())
    }

    async fn read_entries(&self, conversation: &ConversationId) -> Result<Vec<LogEntry>> {
        let path = self.path_for(conversation);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(log_error(&path, e)),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "Skipping unreadable line {} in {}: {}",
                    index + 1,
                    path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl MessageLog for JsonlMessageLog {
    async fn append(&self, conversation: &ConversationId, message: &Message) -> Result<()> {
        self.append_entry(
            conversation,
            &LogEntry::Message {
                message: message.clone(),
            },
        )
        .await
    }

    async fn recent(&self, conversation: &ConversationId, limit: usize) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .read_entries(conversation)
            .await?
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Message { message } => Some(message),
                LogEntry::Summary { .. } => None,
            })
            .collect();
        let start = messages.len().saturating_sub(limit);
        Ok(messages.split_off(start))
    }

    async fn summary(&self, conversation: &ConversationId) -> Result<Option<String>> {
        Ok(self
            .read_entries(conversation)
            .await?
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Summary { summary, .. } => Some(summary),
                LogEntry::Message { .. } => None,
            })
            .last())
    }

    async fn set_summary(&self, conversation: &ConversationId, summary: &str) -> Result<()> {
        self.append_entry(
            conversation,
            &LogEntry::Summary {
                summary: summary.to_string(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        )
        .await
    }

    async fn archive(&self, conversation: &ConversationId) -> Result<()> {
        let path = self.path_for(conversation);
        let archived = self.dir.join(format!(
            "{}.{}.archived",
            encode_file_stem(conversation.as_str()),
            chrono::Utc::now().timestamp_millis()
        ));
        match fs::rename(&path, &archived).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(log_error(&path, e)),
        }
    }
}

fn log_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::log(format!("{}: {}", path.display(), e))
}

/// Map a conversation id to a file stem that is safe on any filesystem.
///
/// ASCII letters, digits, `-` and `_` pass through; every other byte becomes
/// `%XX`, so distinct ids never share a file.
pub fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
