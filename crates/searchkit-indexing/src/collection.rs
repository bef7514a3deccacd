//! Collection contract.
//!
//! A collection adapts one data source to the pipeline. It enumerates the
//! items due for indexing, turns each into a queue message, and later (on
//! the consuming side) loads the item's full data back from the message and
//! populates an [`IndexDocument`] from it.

use searchkit_types::{Limit, QueueMessage, Schema};
use serde_json::Value;

use crate::document::IndexDocument;
use crate::error::IndexingError;

/// An item due for indexing, as enumerated by a collection.
pub type ScheduledItem = Value;

/// Full data of an item, loaded back from its queue message.
pub type SourceData = Value;

/// Lazy, finite sequence of scheduled items.
pub type ScheduledItems<'a> = Box<dyn Iterator<Item = ScheduledItem> + 'a>;

/// Trait for data sources that feed the indexing pipeline.
///
/// Implementations are shared between the collecting and the indexing
/// side, so every method takes `&self` except [`Collection::init`], which
/// runs once before the collection is attached to an agent.
pub trait Collection: Send + Sync {
    /// Stable id, unique among the collections attached to one agent.
    fn id(&self) -> &str;

    /// Apply collection-specific options.
    fn init(&mut self, _options: &Value) -> Result<(), IndexingError> {
        Ok(())
    }

    /// Schema of the documents this collection builds.
    fn schema(&self) -> Result<Schema, IndexingError>;

    /// Enumerate the items due for indexing.
    ///
    /// Each call starts a fresh scan of the source. `limit` is a hint; the
    /// producer enforces it regardless.
    fn fetch_scheduled_items(&self, limit: Limit) -> Result<ScheduledItems<'_>, IndexingError>;

    /// Write the message body identifying `item`.
    fn build_queue_message(
        &self,
        message: &mut QueueMessage,
        item: &ScheduledItem,
    ) -> Result<(), IndexingError>;

    /// Load the full data of the item a message refers to.
    ///
    /// `Ok(None)` (or a falsy value, see [`is_falsy`]) means the data is
    /// unavailable; the indexer logs and skips the item.
    fn load_source_data(&self, message: &QueueMessage) -> Result<Option<SourceData>, IndexingError>;

    /// Attach fields to `document` from `data`.
    fn build_document(
        &self,
        document: &mut IndexDocument,
        data: &SourceData,
    ) -> Result<(), IndexingError>;
}

/// Whether loaded source data counts as absent.
///
/// Null, `false`, empty strings, empty arrays and empty objects are falsy.
pub fn is_falsy(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}
