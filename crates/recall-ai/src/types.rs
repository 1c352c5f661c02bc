//! Core message types shared by the backend client and the engine

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Get the role as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Content blocks in a stored message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// Image referenced by absolute URL
    Image { url: String },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create image content from an absolute URL
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A single conversation message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: Vec<Content>,
    /// Creation time in milliseconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Create a message with the given role and content blocks
    pub fn new(role: Role, content: Vec<Content>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Content::text(text)])
    }

    /// Create a user message with multiple content blocks
    pub fn user_with_content(content: Vec<Content>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Content::text(text)])
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Image URLs attached to this message
    pub fn image_urls(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Image { url } => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text-only rendering used once the message is part of the history.
    ///
    /// Images are folded into a trailing note so the model still knows they
    /// were sent without receiving them again.
    pub fn history_text(&self) -> String {
        let mut text = self.text();
        let images = self.image_urls();
        if !images.is_empty() {
            text.push_str("\n[User sent images: ");
            text.push_str(&images.join(", "));
            text.push(']');
        }
        text
    }
}

/// Image reference inside a multimodal part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multimodal wire message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Wire content: a plain string or a list of parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A role/content pair as sent to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: ChatContent,
}

impl ChatMessage {
    /// Create a plain text wire message
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: ChatContent::Text(text.into()),
        }
    }

    /// Render a stored message as it appears inside the history window
    pub fn from_history(message: &Message) -> Self {
        Self::text(message.role, message.history_text())
    }

    /// Render a stored message with its images as multimodal parts.
    ///
    /// Messages without images stay plain strings. Empty text is left out of
    /// the part list.
    pub fn multimodal(message: &Message) -> Self {
        let images = message.image_urls();
        if images.is_empty() {
            return Self::text(message.role, message.text());
        }

        let mut parts = Vec::with_capacity(images.len() + 1);
        let text = message.text();
        if !text.is_empty() {
            parts.push(ContentPart::Text { text });
        }
        parts.extend(images.into_iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.to_string(),
            },
        }));

        Self {
            role: message.role,
            content: ChatContent::Parts(parts),
        }
    }

    /// Text view of the content, ignoring image parts
    pub fn as_text(&self) -> String {
        match &self.content {
            ChatContent::Text(text) => text.clone(),
            ChatContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// A chat-completion request, independent of streaming mode
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Ordered conversation messages
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature; omitted from the request when `None`
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Create a request for a model
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_text_notes_images() {
        let msg = Message::user_with_content(vec![
            Content::text("look at this"),
            Content::image("http://host/uploads/a.png"),
            Content::image("http://host/uploads/b.png"),
        ]);
        assert_eq!(
            msg.history_text(),
            "look at this\n[User sent images: http://host/uploads/a.png, http://host/uploads/b.png]"
        );
    }

    #[test]
    fn test_multimodal_without_images_is_plain_text() {
        let msg = Message::user("hello");
        let wire = ChatMessage::multimodal(&msg);
        assert_eq!(wire.content, ChatContent::Text("hello".into()));
    }

    #[test]
    fn test_multimodal_serializes_image_parts() {
        let msg = Message::user_with_content(vec![
            Content::text("what is this?"),
            Content::image("http://host/uploads/a.png"),
        ]);
        let json = serde_json::to_value(ChatMessage::multimodal(&msg)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "http://host/uploads/a.png"}}
                ]
            })
        );
    }

    #[test]
    fn test_multimodal_skips_empty_text() {
        let msg = Message::user_with_content(vec![
            Content::text(""),
            Content::image("http://host/a.png"),
        ]);
        match ChatMessage::multimodal(&msg).content {
            ChatContent::Parts(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(parts[0], ContentPart::ImageUrl { .. }));
            }
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[test]
    fn test_message_roundtrips_through_json() {
        let msg = Message::assistant("Hello");
        let line = serde_json::to_string(&msg).unwrap();
        assert!(line.contains("\"role\":\"assistant\""));
        let back: Message = serde_json::from_str(&line).unwrap();
        assert_eq!(back, msg);
    }
}
