//! End-to-end test infrastructure for searchkit.
//!
//! Provides a shared TestHarness plus collections and engines for tests
//! covering the full collect-queue-index pipeline.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use searchkit_collections::StaticCollection;
use searchkit_indexing::{
    names, Collection, CollectionAgent, Event, EventDispatcher, IndexDocument, IndexingError,
    MemoryLogger, Normalizer, NormalizerSet, ScheduledItem, ScheduledItems, SearchEngine,
    SourceData,
};
use searchkit_queue::MemoryQueue;
use searchkit_types::{FieldType, Limit, QueueMessage, Schema, SchemaField};

/// Shared test harness for E2E tests.
///
/// Every agent built from one harness shares its queue connection,
/// logger and dispatcher, so tests can inspect them after a run.
pub struct TestHarness {
    pub queue: Arc<MemoryQueue>,
    pub logger: Arc<MemoryLogger>,
    pub dispatcher: Arc<EventDispatcher>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(MemoryQueue::new()),
            logger: Arc::new(MemoryLogger::new()),
            dispatcher: Arc::new(EventDispatcher::new()),
        }
    }

    /// An agent over the harness queue with no collections attached.
    pub fn agent(&self) -> CollectionAgent {
        CollectionAgent::new(self.queue.clone())
            .with_logger(self.logger.clone())
            .with_dispatcher(self.dispatcher.clone())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Schema keyed by `id` with a string `id` and a fulltext `title`.
pub fn record_schema(name: &str) -> Schema {
    let mut schema = Schema::new().with_name(name).with_unique_field("id");
    schema
        .add_field(SchemaField::new("id", FieldType::String))
        .expect("Failed to add id field");
    schema
        .add_field(SchemaField::new("title", FieldType::Fulltext))
        .expect("Failed to add title field");
    schema
}

/// `count` records with ids `{prefix}-0 .. {prefix}-{count-1}`.
pub fn create_records(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("{prefix}-{i}"),
                "title": format!("Record {i} of {prefix}"),
            })
        })
        .collect()
}

/// In-memory collection `id` over [`create_records`]`(id, count)`.
pub fn static_collection(id: &str, count: usize) -> Arc<StaticCollection> {
    static_collection_with_schema(id, count, record_schema(id))
}

pub fn static_collection_with_schema(id: &str, count: usize, schema: Schema) -> Arc<StaticCollection> {
    let collection = StaticCollection::new(id, schema)
        .and_then(|c| c.with_records(create_records(id, count)))
        .expect("Failed to build static collection");
    Arc::new(collection)
}

/// Write `files` (relative path, content) below `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
    }
}

/// Collection whose scheduled items never run out.
pub struct EndlessCollection {
    id: String,
    fetches: AtomicUsize,
}

impl EndlessCollection {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Calls to `fetch_scheduled_items` so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Collection for EndlessCollection {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema(&self) -> Result<Schema, IndexingError> {
        Ok(record_schema(&self.id))
    }

    fn fetch_scheduled_items(&self, _limit: Limit) -> Result<ScheduledItems<'_>, IndexingError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new((0u64..).map(ScheduledItem::from)))
    }

    fn build_queue_message(
        &self,
        message: &mut QueueMessage,
        item: &ScheduledItem,
    ) -> Result<(), IndexingError> {
        message.set_body(item.to_string());
        Ok(())
    }

    fn load_source_data(&self, message: &QueueMessage) -> Result<Option<SourceData>, IndexingError> {
        Ok(Some(json!({ "id": message.body() })))
    }

    fn build_document(
        &self,
        document: &mut IndexDocument,
        data: &SourceData,
    ) -> Result<(), IndexingError> {
        if let Some(id) = data["id"].as_str() {
            document.set("id", id)?;
        }
        Ok(())
    }
}

/// Engine recording every `index_document` call.
#[derive(Default)]
pub struct RecordingEngine {
    pub normalizers: NormalizerSet,
    /// `to_json` of every document received, in order
    pub documents: Mutex<Vec<Value>>,
    /// Document id that makes `index_document` fail
    pub fail_on: Option<String>,
    /// Document-level events seen while subscribed
    pub events_seen: AtomicUsize,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self {
            normalizers: NormalizerSet::with_defaults(),
            ..Self::default()
        })
    }

    pub fn failing_on(id: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(id.to_string()),
            ..Self::default()
        })
    }

    /// Number of `index_document` calls, failed ones included.
    pub fn calls(&self) -> usize {
        self.documents.lock().expect("documents lock").len()
    }

    pub fn indexed_ids(&self) -> Vec<String> {
        self.documents
            .lock()
            .expect("documents lock")
            .iter()
            .filter_map(|d| d["id"].as_str().map(str::to_string))
            .collect()
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen.load(Ordering::SeqCst)
    }
}

impl SearchEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn normalizer(&self, field_type: &FieldType) -> Option<Arc<dyn Normalizer>> {
        self.normalizers.get(field_type)
    }

    fn subscribed_events(&self) -> Vec<&'static str> {
        vec![names::DOCUMENT_PRE_INDEX]
    }

    fn on_event(&self, _name: &str, _event: &mut Event<'_>) -> Result<(), IndexingError> {
        self.events_seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_index(&self, _schema: &Schema, _options: &Value) -> Result<(), IndexingError> {
        Ok(())
    }

    fn index_document(
        &self,
        _collection: &dyn Collection,
        document: &IndexDocument,
    ) -> Result<(), IndexingError> {
        let json = document.to_json()?;
        let id = json["id"].as_str().map(str::to_string);
        self.documents.lock().expect("documents lock").push(json);
        match (&self.fail_on, id) {
            (Some(fail_on), Some(id)) if *fail_on == id => {
                Err(IndexingError::engine(format!("backend rejected {id}")))
            }
            _ => Ok(()),
        }
    }

    fn search(&self, keywords: &str, _options: &Value) -> Result<Value, IndexingError> {
        let hits: Vec<Value> = self
            .documents
            .lock()
            .expect("documents lock")
            .iter()
            .filter(|d| d.to_string().contains(keywords))
            .cloned()
            .collect();
        Ok(Value::Array(hits))
    }

    fn delete(&self) -> Result<(), IndexingError> {
        self.documents.lock().expect("documents lock").clear();
        Ok(())
    }
}
