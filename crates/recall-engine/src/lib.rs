//! recall-engine: conversational memory on top of a streaming completion backend
//!
//! The engine relays each turn's tokens to the caller, keeps a bounded window
//! of recent messages per conversation, and folds overflow into a running
//! summary instead of discarding it.

pub mod compaction;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod events;
pub mod message_log;
pub mod prompt;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use compaction::Summarizer;
pub use conversation::{ConversationId, ConversationState, MAX_UNSUMMARIZED};
pub use engine::{Engine, EngineConfig, TurnStream};
pub use error::{Error, Result};
pub use events::OutputChunk;
pub use message_log::{InMemoryMessageLog, MessageLog};
pub use prompt::{PromptPlan, resolve_attachment};
