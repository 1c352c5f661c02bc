//! recall-ai: Chat-completion backend client
//!
//! This crate provides the message types shared by the conversation engine and
//! a client for OpenAI-compatible chat-completion services, usable either as a
//! token-delta stream or as a single materialized reply.

pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use providers::{CompletionBackend, openai::{OpenAICompatClient, OpenAIConfig}};
pub use stream::{StreamEvent, TextAccumulator, TokenStream};
pub use types::*;
