//! Error types for recall-ai

use thiserror::Error;

/// Result type alias using recall-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a completion backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (connection refused, reset, DNS, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend answered with a non-2xx status
    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Backend did not answer within the configured deadline
    #[error("Backend timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a status error from a code and a body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if this error came from the transport rather than from a payload.
    ///
    /// Transport errors are connection failures, timeouts, non-2xx answers and
    /// broken event streams; they end a request. Payload errors describe a
    /// response that arrived but could not be understood.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Status { .. } | Error::Timeout(_) | Error::Sse(_)
        )
    }
}
