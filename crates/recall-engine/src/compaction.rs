//! Summary compaction for conversations that outgrow their window
//!
//! Overflowed dialog is folded into the running summary with one
//! non-streaming completion call. The new summary replaces the old one.

use std::sync::Arc;

use recall_ai::{ChatMessage, ChatRequest, CompletionBackend, Message, Role};
use tracing::debug;

use crate::{Error, Result};

const SUMMARIZATION_SYSTEM_PROMPT: &str = "You are a memory engine.";

const SUMMARIZATION_PROMPT: &str = "\
Update the long-term memory summary of a conversation.

Rules:
- Keep facts about the user, their preferences and their goals.
- Remove chit-chat and small talk.
- Keep it short, accurate and factual.
- Never contradict the previous summary.

PREVIOUS SUMMARY:
{previous_summary}

NEW DIALOG:
{dialog}

UPDATED SUMMARY:";

/// Render messages as `ROLE: content` lines
fn serialize_dialog(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|msg| format!("{}: {}", msg.role.as_str().to_uppercase(), msg.history_text()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the user prompt for one compaction
pub fn summarization_prompt(previous_summary: &str, dialog: &[Message]) -> String {
    let previous = if previous_summary.trim().is_empty() {
        "(empty)"
    } else {
        previous_summary.trim()
    };
    // Single pass: placeholder text inside either value stays literal
    let mut prompt = String::with_capacity(SUMMARIZATION_PROMPT.len() + previous.len());
    let mut rest = SUMMARIZATION_PROMPT;
    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        rest = &rest[start..];
        if let Some(tail) = rest.strip_prefix("{previous_summary}") {
            prompt.push_str(previous);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("{dialog}") {
            prompt.push_str(&serialize_dialog(dialog));
            rest = tail;
        } else {
            prompt.push('{');
            rest = &rest[1..];
        }
    }
    prompt.push_str(rest);
    prompt
}

/// Folds dialog into a running summary through a completion backend
pub struct Summarizer {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    temperature: Option<f32>,
}

impl Summarizer {
    pub fn new(backend: Arc<dyn CompletionBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Produce the summary that replaces `previous_summary`.
    ///
    /// Fails with [`Error::Compaction`] when the backend answers with nothing
    /// usable; callers keep the previous summary in that case.
    pub async fn compact(&self, previous_summary: &str, dialog: &[Message]) -> Result<String> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::text(Role::System, SUMMARIZATION_SYSTEM_PROMPT),
                ChatMessage::text(Role::User, summarization_prompt(previous_summary, dialog)),
            ],
        )
        .with_temperature(self.temperature);

        debug!(dialog = dialog.len(), "Requesting summary");

        let text = self
            .backend
            .complete(&request)
            .await
            .map_err(|e| Error::Compaction(format!("summarization call failed: {}", e)))?;

        let summary = text.trim();
        if summary.is_empty() {
            return Err(Error::Compaction(
                "summarization returned an empty response".to_string(),
            ));
        }

        Ok(summary.to_string())
    }
}
