//! Message log interface and an in-memory implementation

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use recall_ai::Message;

use crate::{ConversationId, Result};

/// Append-only ordered store of messages, plus one summary per conversation.
///
/// Implementations must allow concurrent use across distinct conversations.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Append a message to the end of a conversation
    async fn append(&self, conversation: &ConversationId, message: &Message) -> Result<()>;

    /// The newest `limit` messages, oldest first
    async fn recent(&self, conversation: &ConversationId, limit: usize) -> Result<Vec<Message>>;

    /// The stored summary, if one was ever written
    async fn summary(&self, conversation: &ConversationId) -> Result<Option<String>>;

    /// Replace the stored summary
    async fn set_summary(&self, conversation: &ConversationId, summary: &str) -> Result<()>;

    /// Soft-delete a conversation's messages and summary.
    ///
    /// Afterwards the conversation reads as empty; the archived records are
    /// kept by the implementation, not destroyed.
    async fn archive(&self, conversation: &ConversationId) -> Result<()>;
}

#[derive(Debug, Default)]
struct Entry {
    messages: Vec<Message>,
    summary: Option<String>,
}

/// Message log kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    conversations: Mutex<HashMap<ConversationId, Entry>>,
    archived: Mutex<Vec<(ConversationId, Entry)>>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message stored for a conversation
    pub fn messages(&self, conversation: &ConversationId) -> Vec<Message> {
        self.conversations
            .lock()
            .get(conversation)
            .map(|e| e.messages.clone())
            .unwrap_or_default()
    }

    /// Number of archived snapshots of a conversation
    pub fn archived_count(&self, conversation: &ConversationId) -> usize {
        self.archived
            .lock()
            .iter()
            .filter(|(id, _)| id == conversation)
            .count()
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn append(&self, conversation: &ConversationId, message: &Message) -> Result<()> {
        self.conversations
            .lock()
            .entry(conversation.clone())
            .or_default()
            .messages
            .push(message.clone());
        Ok(())
    }

    async fn recent(&self, conversation: &ConversationId, limit: usize) -> Result<Vec<Message>> {
        let conversations = self.conversations.lock();
        let Some(entry) = conversations.get(conversation) else {
            return Ok(Vec::new());
        };
        let start = entry.messages.len().saturating_sub(limit);
        Ok(entry.messages[start..].to_vec())
    }

    async fn summary(&self, conversation: &ConversationId) -> Result<Option<String>> {
        Ok(self
            .conversations
            .lock()
            .get(conversation)
            .and_then(|e| e.summary.clone()))
    }

    async fn set_summary(&self, conversation: &ConversationId, summary: &str) -> Result<()> {
        self.conversations
            .lock()
            .entry(conversation.clone())
            .or_default()
            .summary = Some(summary.to_string());
        Ok(())
    }

    async fn archive(&self, conversation: &ConversationId) -> Result<()> {
        let entry = self.conversations.lock().remove(conversation);
        if let Some(entry) = entry {
            self.archived.lock().push((conversation.clone(), entry));
        }
        Ok(())
    }
}
