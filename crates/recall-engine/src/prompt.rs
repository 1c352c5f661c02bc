//! Outbound prompt assembly and attachment resolution

use recall_ai::{ChatMessage, ChatRequest, Message, Role};

use crate::{Error, Result};

const MEMORY_HEADER: &str = "### MEMORY";

/// Schemes that mark a reference as already absolute
const ABSOLUTE_SCHEMES: &[&str] = &["http://", "https://", "data:"];

/// Turn an attachment reference into an absolute URL.
///
/// Absolute references pass through unchanged; anything else is joined onto
/// `base` with exactly one slash between them.
pub fn resolve_attachment(reference: &str, base: &str) -> Result<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(Error::validation("attachment reference must not be empty"));
    }

    if ABSOLUTE_SCHEMES
        .iter()
        .any(|scheme| reference.starts_with(scheme))
    {
        return Ok(reference.to_string());
    }

    let base = base.trim_end_matches('/');
    if reference.starts_with('/') {
        Ok(format!("{}{}", base, reference))
    } else {
        Ok(format!("{}/{}", base, reference))
    }
}

/// Ordered messages for one outbound completion call.
///
/// Layout: system prompt (if any), memory block (if the summary is non-empty),
/// the history window rendered as text, then the current turn with its images.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPlan {
    pub messages: Vec<ChatMessage>,
}

impl PromptPlan {
    pub fn build(system_prompt: &str, summary: &str, window: &[Message], current: &Message) -> Self {
        let mut messages = Vec::with_capacity(window.len() + 3);

        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::text(Role::System, system_prompt));
        }
        if !summary.trim().is_empty() {
            messages.push(ChatMessage::text(Role::System, memory_block(summary)));
        }
        messages.extend(window.iter().map(ChatMessage::from_history));
        messages.push(ChatMessage::multimodal(current));

        Self { messages }
    }

    /// Number of conversation messages (window plus current turn)
    pub fn conversation_len(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .count()
    }

    pub fn into_request(self, model: &str, temperature: Option<f32>) -> ChatRequest {
        ChatRequest::new(model, self.messages).with_temperature(temperature)
    }
}

fn memory_block(summary: &str) -> String {
    format!("{}\n{}\n", MEMORY_HEADER, summary)
}
