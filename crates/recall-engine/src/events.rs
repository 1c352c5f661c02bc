//! Output chunks relayed to the caller

use serde::{Deserialize, Serialize};

/// One unit of a turn's output.
///
/// Serializes to the event payloads the caller sees: `{"token": "..."}` for
/// each delta and a single `{"error": "..."}` before the stream closes on
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputChunk {
    Token { token: String },
    Error { error: String },
}

impl OutputChunk {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        assert_eq!(
            serde_json::to_string(&OutputChunk::token("Hel")).unwrap(),
            r#"{"token":"Hel"}"#
        );
        assert_eq!(
            serde_json::to_string(&OutputChunk::error("boom")).unwrap(),
            r#"{"error":"boom"}"#
        );
    }
}
