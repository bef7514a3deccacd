//! Collection over records held in memory.

use std::sync::{PoisonError, RwLock};

use searchkit_indexing::{
    Collection, IndexDocument, IndexField, IndexingError, ScheduledItem, ScheduledItems,
    SourceData,
};
use searchkit_types::{Limit, QueueMessage, Schema};
use serde_json::Value;

use crate::field_value;

/// Ordered JSON records keyed by the schema's unique field.
///
/// Records can be removed after they were queued; loading one that is
/// gone reports the source data as unavailable.
#[derive(Debug)]
pub struct StaticCollection {
    id: String,
    schema: Schema,
    unique_field: String,
    records: RwLock<Vec<(String, Value)>>,
}

impl StaticCollection {
    /// The schema must declare a unique field.
    pub fn new(id: impl Into<String>, schema: Schema) -> Result<Self, IndexingError> {
        let id = id.into();
        let unique_field = schema
            .unique_field()
            .map(str::to_string)
            .ok_or_else(|| IndexingError::collection(format!("collection '{id}' has no unique field")))?;
        Ok(Self {
            id,
            schema,
            unique_field,
            records: RwLock::new(Vec::new()),
        })
    }

    pub fn with_records(self, records: impl IntoIterator<Item = Value>) -> Result<Self, IndexingError> {
        for record in records {
            self.insert(record)?;
        }
        Ok(self)
    }

    fn key_of(&self, record: &Value) -> Result<String, IndexingError> {
        match record.get(&self.unique_field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(IndexingError::collection(format!(
                "record in '{}' has no '{}'",
                self.id, self.unique_field
            ))),
        }
    }

    /// Insert a record, replacing any record with the same key.
    pub fn insert(&self, record: Value) -> Result<(), IndexingError> {
        let key = self.key_of(&record)?;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = record,
            None => records.push((key, record)),
        }
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let position = records.iter().position(|(k, _)| k == key)?;
        Some(records.remove(position).1)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, record)| record.clone())
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Collection for StaticCollection {
    fn id(&self) -> &str {
        &self.id
    }

    /// Accepts `{"records": [...]}`.
    fn init(&mut self, options: &Value) -> Result<(), IndexingError> {
        if let Some(records) = options.get("records").and_then(Value::as_array) {
            for record in records {
                self.insert(record.clone())?;
            }
        }
        Ok(())
    }

    fn schema(&self) -> Result<Schema, IndexingError> {
        Ok(self.schema.clone())
    }

    fn fetch_scheduled_items(&self, limit: Limit) -> Result<ScheduledItems<'_>, IndexingError> {
        let keys: Vec<ScheduledItem> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .take(limit.as_option().unwrap_or(usize::MAX))
            .map(|(key, _)| ScheduledItem::String(key.clone()))
            .collect();
        Ok(Box::new(keys.into_iter()))
    }

    fn build_queue_message(
        &self,
        message: &mut QueueMessage,
        item: &ScheduledItem,
    ) -> Result<(), IndexingError> {
        let key = item
            .as_str()
            .ok_or_else(|| IndexingError::collection(format!("not a record key: {item}")))?;
        message.set_body(key);
        Ok(())
    }

    fn load_source_data(&self, message: &QueueMessage) -> Result<Option<SourceData>, IndexingError> {
        Ok(self.get(message.body()))
    }

    fn build_document(
        &self,
        document: &mut IndexDocument,
        data: &SourceData,
    ) -> Result<(), IndexingError> {
        for field in self.schema.fields() {
            if let Some(value) = data.get(field.id()).and_then(field_value) {
                document.attach_field(IndexField::new(field.id(), value).with_name(field.name()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchkit_types::{FieldType, FieldValue, SchemaField};
    use serde_json::json;

    fn schema() -> Schema {
        let mut schema = Schema::new().with_unique_field("id");
        schema
            .add_field(SchemaField::new("id", FieldType::String))
            .unwrap();
        schema
            .add_field(SchemaField::new("title", FieldType::Fulltext).with_name("Title"))
            .unwrap();
        schema
            .add_field(SchemaField::new("tags", FieldType::String).multivalued(true))
            .unwrap();
        schema
    }

    fn collection() -> StaticCollection {
        StaticCollection::new("posts", schema())
            .unwrap()
            .with_records([
                json!({"id": "p1", "title": "First", "tags": ["a", "b"]}),
                json!({"id": "p2", "title": "Second"}),
                json!({"id": 3, "title": "Third"}),
            ])
            .unwrap()
    }

    fn keys(collection: &StaticCollection, limit: Limit) -> Vec<String> {
        collection
            .fetch_scheduled_items(limit)
            .unwrap()
            .map(|item| item.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_requires_unique_field() {
        let result = StaticCollection::new("posts", Schema::new());
        assert!(matches!(result, Err(IndexingError::Collection(_))));
    }

    #[test]
    fn test_records_keyed_in_order() {
        let collection = collection();
        assert_eq!(collection.len(), 3);
        assert_eq!(keys(&collection, Limit::Unbounded), vec!["p1", "p2", "3"]);
        assert_eq!(keys(&collection, Limit::Max(2)), vec!["p1", "p2"]);
    }

    #[test]
    fn test_insert_replaces_same_key() {
        let collection = collection();
        collection
            .insert(json!({"id": "p1", "title": "Updated"}))
            .unwrap();
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.get("p1").unwrap()["title"], json!("Updated"));
        assert!(collection.insert(json!({"title": "no key"})).is_err());
    }

    #[test]
    fn test_removed_record_is_unavailable() {
        let collection = collection();
        let message = QueueMessage::new().with_body("p2");
        assert!(collection.load_source_data(&message).unwrap().is_some());

        collection.remove("p2");
        assert!(collection.load_source_data(&message).unwrap().is_none());
        assert!(collection.remove("p2").is_none());
    }

    #[test]
    fn test_build_document_uses_schema_fields() {
        let collection = collection();
        let data = collection.get("p1").unwrap();
        let mut document = IndexDocument::detached();
        collection.build_document(&mut document, &data).unwrap();

        assert_eq!(document.field_ids(), vec!["id", "title", "tags"]);
        assert_eq!(document.get_field("title").unwrap().name(), "Title");
        assert_eq!(
            document.get("tags").unwrap(),
            Some(FieldValue::from(vec!["a", "b"]))
        );
    }

    #[test]
    fn test_init_loads_records() {
        let mut collection = StaticCollection::new("posts", schema()).unwrap();
        collection
            .init(&json!({"records": [{"id": "x"}, {"id": "y"}]}))
            .unwrap();
        assert_eq!(keys(&collection, Limit::Unbounded), vec!["x", "y"]);
    }
}
