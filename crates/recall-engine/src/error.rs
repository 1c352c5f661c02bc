//! Error types for recall-engine

use thiserror::Error;

/// Result type alias using recall-engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling a conversation turn
#[derive(Error, Debug)]
pub enum Error {
    /// Caller input was rejected before anything happened
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The message log could not be read or written
    #[error("Message log error: {0}")]
    Log(String),

    /// Summarization did not produce a usable summary
    #[error("Compaction error: {0}")]
    Compaction(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn log(msg: impl Into<String>) -> Self {
        Self::Log(msg.into())
    }

    /// Check if this error was caused by caller input
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
