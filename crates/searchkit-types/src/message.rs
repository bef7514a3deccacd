//! Queue message envelope.
//!
//! A message is built by a collection for each item scheduled for
//! indexing, published to a queue backend by the collector, and consumed
//! by the indexer, which uses `collection_id` to find the collection that
//! can load the item's source data.

use serde::{Deserialize, Serialize};

/// A message moved through a queue backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Opaque payload, usually a stable item identifier
    pub body: String,

    /// Set when the item could not be fetched but processing should go on
    #[serde(default)]
    pub error: bool,

    /// Backend-assigned sequence id. Only set by `consume`, never on publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Id of the collection the message originated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
}

impl QueueMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_collection(mut self, collection_id: impl Into<String>) -> Self {
        self.collection_id = Some(collection_id.into());
        self
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn set_error(&mut self, error: bool) {
        self.error = error;
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn collection_id(&self) -> Option<&str> {
        self.collection_id.as_deref()
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
