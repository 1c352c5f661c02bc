//! Streaming event types and utilities

use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while relaying a streaming completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A non-empty piece of generated text
    Delta { text: String },
    /// The backend signalled the end of the completion
    Done,
    /// The stream failed; no further events follow
    Error { message: String },
}

impl StreamEvent {
    /// Create a delta event
    pub fn delta(text: impl Into<String>) -> Self {
        Self::Delta { text: text.into() }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// A stream of completion events
pub type TokenStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Collects deltas into the final assistant text
#[derive(Debug, Default)]
pub struct TextAccumulator {
    text: String,
    deltas: usize,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a streaming event and update the accumulated state
    pub fn process_event(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Delta { text } => {
                self.text.push_str(text);
                self.deltas += 1;
            }
            StreamEvent::Done | StreamEvent::Error { .. } => {}
        }
    }

    /// Number of deltas seen so far
    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    /// Concatenated text, or `None` when no delta was received
    pub fn finish(self) -> Option<String> {
        (self.deltas > 0).then_some(self.text)
    }
}
