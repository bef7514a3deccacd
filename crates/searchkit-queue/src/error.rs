//! Error types for queue backends.

use thiserror::Error;

/// Errors that can occur while talking to a queue backend.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Backend-specific failure (connection, broker, storage)
    #[error("Queue backend error: {0}")]
    Backend(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueueError::Backend("connection refused".to_string());
        assert_eq!(err.to_string(), "Queue backend error: connection refused");
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<u64>("x").unwrap_err();
        let err: QueueError = json_err.into();
        assert!(matches!(err, QueueError::Serialization(_)));
    }
}
