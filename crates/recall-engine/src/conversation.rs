//! Per-conversation state: running summary, live window, and carry-over.

use std::fmt;

use recall_ai::Message;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on messages held back after failed compactions
pub const MAX_UNSUMMARIZED: usize = 64;

/// Stable key of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Create an id, rejecting blank keys
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::validation("conversation id must not be empty"));
        }
        Ok(Self(id))
    }

    /// Derive the id for an authenticated caller and an optional named thread
    pub fn for_caller(caller: &str, conversation: Option<&str>) -> Result<Self> {
        let caller = caller.trim();
        if caller.is_empty() {
            return Err(Error::validation("caller identity is required"));
        }
        let caller = escape_part(caller);
        match conversation.map(str::trim).filter(|c| !c.is_empty()) {
            Some(name) => Self::new(format!("{}/{}", caller, escape_part(name))),
            None => Self::new(caller),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Escape the separator so that `/` only ever joins caller and thread
fn escape_part(part: &str) -> String {
    part.replace('%', "%25").replace('/', "%2F")
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversation state owned by the engine.
///
/// After every completed turn `recent.len() <= capacity`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    /// Running summary; empty until the first successful compaction
    pub summary: String,
    /// Most recent messages, oldest first
    pub recent: Vec<Message>,
    /// Window capacity in messages
    pub capacity: usize,
    /// Messages trimmed from the window while summarization was failing
    pub unsummarized: Vec<Message>,
}

impl ConversationState {
    pub fn new(capacity: usize) -> Self {
        Self {
            summary: String::new(),
            recent: Vec::new(),
            capacity,
            unsummarized: Vec::new(),
        }
    }

    /// Restore state from persisted parts
    pub fn restore(capacity: usize, summary: Option<String>, recent: Vec<Message>) -> Self {
        let mut state = Self::new(capacity);
        state.summary = summary.unwrap_or_default();
        state.recent = recent;
        crate::window::trim(&mut state.recent, capacity);
        state
    }

    /// Hold back messages that left the window without being summarized.
    ///
    /// Returns how many of the oldest held-back messages had to be dropped to
    /// stay within [`MAX_UNSUMMARIZED`].
    pub fn carry_over(&mut self, evicted: Vec<Message>) -> usize {
        self.unsummarized.extend(evicted);
        let excess = self.unsummarized.len().saturating_sub(MAX_UNSUMMARIZED);
        if excess > 0 {
            self.unsummarized.drain(..excess);
        }
        excess
    }
}
