//! Completion backend implementations

pub mod openai;

use crate::{ChatRequest, Result, TokenStream};
use async_trait::async_trait;

/// A chat-completion backend
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Stream a completion as a sequence of text deltas.
    ///
    /// Failures after the stream has started are reported in-band as
    /// [`crate::StreamEvent::Error`].
    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream>;

    /// Run a single non-streaming completion and return its text
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}
