//! Error types for the shared domain types.

use thiserror::Error;

/// Errors raised while building schemas, messages or settings.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A field id is already present in the schema
    #[error("Duplicate field id: {0}")]
    DuplicateField(String),

    /// A display name is already bound to another field
    #[error("Duplicate field name: {0}")]
    DuplicateName(String),

    /// Field id not present in the schema
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypesError::DuplicateField("title".to_string());
        assert_eq!(err.to_string(), "Duplicate field id: title");

        let err = TypesError::FieldNotFound("body".to_string());
        assert_eq!(err.to_string(), "Field not found: body");
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: TypesError = json_err.into();
        assert!(matches!(err, TypesError::Serialization(_)));
    }
}
