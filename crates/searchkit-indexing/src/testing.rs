//! Mock collaborators shared by the unit tests of this crate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use searchkit_types::{FieldType, Limit, QueueMessage, Schema, SchemaField};
use serde_json::{json, Value};

use crate::collection::{Collection, ScheduledItems, SourceData};
use crate::document::IndexDocument;
use crate::engine::SearchEngine;
use crate::error::IndexingError;
use crate::normalizer::{Normalizer, NormalizerSet};

pub fn item_schema(name: &str) -> Schema {
    let mut schema = Schema::new().with_name(name).with_unique_field("id");
    schema
        .add_field(SchemaField::new("id", FieldType::String))
        .unwrap();
    schema
        .add_field(SchemaField::new("title", FieldType::Fulltext))
        .unwrap();
    schema
}

/// Collection over `item-0 .. item-{n-1}`.
pub struct MockCollection {
    pub id: String,
    pub schema: Schema,
    pub items: Vec<Value>,
    /// Item ids whose source data is unavailable
    pub missing: HashSet<String>,
}

impl MockCollection {
    pub fn new(id: &str, count: usize) -> Self {
        let items = (0..count).map(|i| json!({ "id": format!("{id}-{i}") })).collect();
        Self {
            id: id.to_string(),
            schema: item_schema(id),
            items,
            missing: HashSet::new(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_missing(mut self, item_id: &str) -> Self {
        self.missing.insert(item_id.to_string());
        self
    }
}

impl Collection for MockCollection {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema(&self) -> Result<Schema, IndexingError> {
        Ok(self.schema.clone())
    }

    fn fetch_scheduled_items(&self, _limit: Limit) -> Result<ScheduledItems<'_>, IndexingError> {
        Ok(Box::new(self.items.iter().cloned()))
    }

    fn build_queue_message(
        &self,
        message: &mut QueueMessage,
        item: &Value,
    ) -> Result<(), IndexingError> {
        let id = item["id"]
            .as_str()
            .ok_or_else(|| IndexingError::collection("item without id"))?;
        message.set_body(id);
        Ok(())
    }

    fn load_source_data(&self, message: &QueueMessage) -> Result<Option<SourceData>, IndexingError> {
        if self.missing.contains(message.body()) {
            return Ok(None);
        }
        Ok(Some(json!({
            "id": message.body(),
            "title": format!("Title of {}", message.body()),
        })))
    }

    fn build_document(
        &self,
        document: &mut IndexDocument,
        data: &SourceData,
    ) -> Result<(), IndexingError> {
        for field in ["id", "title"] {
            if let Some(value) = data[field].as_str() {
                document.set(field, value)?;
            }
        }
        Ok(())
    }
}

/// Engine recording every document it receives.
#[derive(Default)]
pub struct RecordingEngine {
    pub normalizers: NormalizerSet,
    pub documents: Mutex<Vec<Value>>,
    pub created: Mutex<Vec<Value>>,
    /// Document id that makes `index_document` fail
    pub fail_on: Option<String>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(id: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(id.to_string()),
            ..Self::default()
        })
    }

    pub fn indexed_ids(&self) -> Vec<String> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .filter_map(|d| d["id"].as_str().map(str::to_string))
            .collect()
    }
}

impl SearchEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn normalizer(&self, field_type: &FieldType) -> Option<Arc<dyn Normalizer>> {
        self.normalizers.get(field_type)
    }

    fn create_index(&self, schema: &Schema, options: &Value) -> Result<(), IndexingError> {
        self.created.lock().unwrap().push(json!({
            "fields": schema.field_ids(),
            "options": options,
        }));
        Ok(())
    }

    fn index_document(
        &self,
        _collection: &dyn Collection,
        document: &IndexDocument,
    ) -> Result<(), IndexingError> {
        let json = document.to_json()?;
        if let Some(fail_on) = &self.fail_on {
            if json["id"].as_str() == Some(fail_on.as_str()) {
                return Err(IndexingError::engine(format!("rejected {fail_on}")));
            }
        }
        self.documents.lock().unwrap().push(json);
        Ok(())
    }

    fn search(&self, keywords: &str, _options: &Value) -> Result<Value, IndexingError> {
        let hits: Vec<Value> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.to_string().contains(keywords))
            .cloned()
            .collect();
        Ok(json!({ "hits": hits }))
    }

    fn delete(&self) -> Result<(), IndexingError> {
        self.documents.lock().unwrap().clear();
        Ok(())
    }
}
