//! Error types for the indexing pipeline.

use searchkit_queue::QueueError;
use searchkit_types::TypesError;
use thiserror::Error;

/// Errors that can occur in the indexing pipeline
#[derive(Error, Debug)]
pub enum IndexingError {
    /// A collection with the same id is already attached
    #[error("Collection already attached: {0}")]
    DuplicateCollection(String),

    /// No attached collection has this id
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Collections disagree on the unique field
    #[error(
        "Unique field conflict in collection '{collection}': expected {expected:?}, found {found:?}"
    )]
    UniqueFieldConflict {
        collection: String,
        expected: Option<String>,
        found: Option<String>,
    },

    /// Collections define the same field differently
    #[error("Field conflict in collection '{collection}': '{field}' is already defined differently")]
    FieldConflict { collection: String, field: String },

    /// Field id not attached to the document
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Search engine has no normalizer for this field type
    #[error("No normalizer for field type: {0}")]
    NormalizerNotFound(String),

    /// Collection collaborator failed
    #[error("Collection error: {0}")]
    Collection(String),

    /// Search engine collaborator failed
    #[error("Search engine error: {0}")]
    Engine(String),

    /// An event listener failed
    #[error("Event listener error: {0}")]
    Listener(String),

    /// Queue backend error
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Schema or settings error
    #[error("Types error: {0}")]
    Types(#[from] TypesError),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IndexingError {
    pub fn collection(message: impl Into<String>) -> Self {
        Self::Collection(message.into())
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}
