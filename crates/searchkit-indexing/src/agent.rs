//! Collection agent: state shared by collectors and indexers.
//!
//! The agent owns the attached collections, the queue backend, the worker
//! bounds, the logger and the event dispatcher of a pipeline run, plus a
//! cached fused schema. The cache is an immutable `Arc<Schema>` that is
//! dropped whenever the set of collections changes and rebuilt on the next
//! [`CollectionAgent::schema`] call.

use std::collections::HashMap;
use std::sync::Arc;

use searchkit_queue::QueueBackend;
use searchkit_types::{FieldType, Limit, Schema, Timeout, TypesError, WorkerBounds};
use serde_json::json;

use crate::collection::Collection;
use crate::document::FieldContext;
use crate::error::IndexingError;
use crate::events::{Event, EventDispatcher};
use crate::logger::{log_context, LogContext, Logger, TracingLogger};

/// Collections, queue and run configuration.
#[derive(Clone)]
pub struct CollectionAgent {
    collections: Vec<Arc<dyn Collection>>,
    queue: Arc<dyn QueueBackend>,
    schema: Option<Arc<Schema>>,
    field_types: Arc<HashMap<String, FieldType>>,
    bounds: WorkerBounds,
    logger: Arc<dyn Logger>,
    dispatcher: Arc<EventDispatcher>,
}

impl std::fmt::Debug for CollectionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionAgent")
            .field("collections", &self.collection_ids())
            .field("queue", &self.queue.name())
            .field("schema_cached", &self.schema.is_some())
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl CollectionAgent {
    pub fn new(queue: Arc<dyn QueueBackend>) -> Self {
        Self {
            collections: Vec::new(),
            queue,
            schema: None,
            field_types: Arc::new(HashMap::new()),
            bounds: WorkerBounds::unbounded(),
            logger: Arc::new(TracingLogger),
            dispatcher: Arc::new(EventDispatcher::new()),
        }
    }

    pub fn with_bounds(mut self, bounds: WorkerBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.bounds.limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.bounds.timeout = timeout;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Share a dispatcher with other components of the same run.
    pub fn with_dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Attach a collection. Ids must be unique within the agent.
    pub fn attach_collection(&mut self, collection: Arc<dyn Collection>) -> Result<(), IndexingError> {
        let id = collection.id().to_string();
        if self.collection(&id).is_some() {
            return Err(IndexingError::DuplicateCollection(id));
        }
        self.collections.push(collection);
        self.invalidate_schema();
        self.logger.debug(
            "Collection attached",
            &log_context([("collection", json!(id))]),
        );
        Ok(())
    }

    /// Remove a collection if attached. Returns whether it was.
    pub fn remove_collection(&mut self, collection_id: &str) -> bool {
        let before = self.collections.len();
        self.collections.retain(|c| c.id() != collection_id);
        self.invalidate_schema();
        before != self.collections.len()
    }

    pub fn collection(&self, collection_id: &str) -> Option<&Arc<dyn Collection>> {
        self.collections.iter().find(|c| c.id() == collection_id)
    }

    pub fn get_collection(&self, collection_id: &str) -> Result<&Arc<dyn Collection>, IndexingError> {
        self.collection(collection_id)
            .ok_or_else(|| IndexingError::CollectionNotFound(collection_id.to_string()))
    }

    /// Attached collections in attachment order.
    pub fn collections(&self) -> &[Arc<dyn Collection>] {
        &self.collections
    }

    pub fn collection_ids(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.id()).collect()
    }

    /// Fused schema of all attached collections.
    ///
    /// Computed on first use after a change and cached. Computing it also
    /// refreshes the field type map handed to documents.
    pub fn schema(&mut self) -> Result<Arc<Schema>, IndexingError> {
        if let Some(schema) = &self.schema {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(fuse_schemas(&self.collections)?);
        self.field_types = Arc::new(schema.field_types());
        self.schema = Some(Arc::clone(&schema));
        self.logger.debug(
            "Schema fused",
            &log_context([
                ("collections", json!(self.collection_ids())),
                ("fields", json!(schema.field_ids())),
            ]),
        );
        Ok(schema)
    }

    pub fn cached_schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    fn invalidate_schema(&mut self) {
        self.schema = None;
    }

    /// Field id -> type of the last fused schema.
    pub fn field_types(&self) -> &Arc<HashMap<String, FieldType>> {
        &self.field_types
    }

    /// Context for documents built during this run.
    pub fn field_context(&self) -> FieldContext {
        FieldContext::new(Arc::clone(&self.dispatcher), Arc::clone(&self.field_types))
            .with_logger(Arc::clone(&self.logger))
    }

    pub fn queue(&self) -> &Arc<dyn QueueBackend> {
        &self.queue
    }

    pub fn bounds(&self) -> WorkerBounds {
        self.bounds
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Dispatch an event, with debug log entries before and after.
    pub fn dispatch(
        &self,
        name: &str,
        event: &mut Event<'_>,
        mut context: LogContext,
    ) -> Result<(), IndexingError> {
        context.insert("event".to_string(), json!(name));
        self.logger.debug("Dispatching event", &context);
        self.dispatcher.dispatch(name, event)?;
        self.logger.debug("Event dispatched", &context);
        Ok(())
    }
}

/// Fuse the schemas of `collections` in order.
///
/// The first schema seeds the result, name and unique field included.
/// See [`merge_schema`] for how the others are folded in.
pub fn fuse_schemas(collections: &[Arc<dyn Collection>]) -> Result<Schema, IndexingError> {
    let mut iter = collections.iter();
    let Some(first) = iter.next() else {
        return Ok(Schema::new());
    };

    let mut fused = first.schema()?;
    for collection in iter {
        merge_schema(&mut fused, collection.id(), &collection.schema()?)?;
    }
    Ok(fused)
}

/// Fold one collection's schema into `fused`.
///
/// The unique fields must match. A field id already present must have an
/// identical serialized definition; new ids are appended.
pub fn merge_schema(
    fused: &mut Schema,
    collection_id: &str,
    schema: &Schema,
) -> Result<(), IndexingError> {
    if fused.unique_field() != schema.unique_field() {
        return Err(IndexingError::UniqueFieldConflict {
            collection: collection_id.to_string(),
            expected: fused.unique_field().map(str::to_string),
            found: schema.unique_field().map(str::to_string),
        });
    }

    for field in schema.fields() {
        match fused.field(field.id()) {
            Some(existing) => {
                if !existing.same_definition(field)? {
                    return Err(IndexingError::FieldConflict {
                        collection: collection_id.to_string(),
                        field: field.id().to_string(),
                    });
                }
            }
            None => fused.add_field(field.clone()).map_err(|e| match e {
                TypesError::DuplicateName(_) => IndexingError::FieldConflict {
                    collection: collection_id.to_string(),
                    field: field.id().to_string(),
                },
                other => other.into(),
            })?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{names, QueueEvent};
    use crate::logger::{LogLevel, MemoryLogger};
    use crate::testing::{item_schema, MockCollection};
    use searchkit_queue::MemoryQueue;
    use searchkit_types::SchemaField;

    fn agent() -> CollectionAgent {
        CollectionAgent::new(Arc::new(MemoryQueue::new()))
    }

    #[test]
    fn test_attach_rejects_duplicate_id() {
        let mut agent = agent();
        agent
            .attach_collection(Arc::new(MockCollection::new("docs", 1)))
            .unwrap();
        let err = agent
            .attach_collection(Arc::new(MockCollection::new("docs", 2)))
            .unwrap_err();
        assert!(matches!(err, IndexingError::DuplicateCollection(id) if id == "docs"));
        assert_eq!(agent.collections().len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut agent = agent();
        agent
            .attach_collection(Arc::new(MockCollection::new("docs", 1)))
            .unwrap();
        assert!(agent.remove_collection("docs"));
        assert!(!agent.remove_collection("docs"));
        assert!(agent.collection("docs").is_none());
        assert!(matches!(
            agent.get_collection("docs"),
            Err(IndexingError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_schema_cache_invalidated_on_change() {
        let mut agent = agent();
        agent
            .attach_collection(Arc::new(MockCollection::new("a", 1)))
            .unwrap();
        let first = agent.schema().unwrap();
        assert!(Arc::ptr_eq(&first, &agent.schema().unwrap()));

        let mut extra = item_schema("b");
        extra
            .add_field(SchemaField::new("size", FieldType::Integer))
            .unwrap();
        agent
            .attach_collection(Arc::new(MockCollection::new("b", 1).with_schema(extra)))
            .unwrap();
        assert!(agent.cached_schema().is_none());

        let second = agent.schema().unwrap();
        assert!(second.contains("size"));
        assert_eq!(agent.field_types().get("size"), Some(&FieldType::Integer));

        agent.remove_collection("b");
        assert!(agent.cached_schema().is_none());
        assert!(!agent.schema().unwrap().contains("size"));
    }

    #[test]
    fn test_empty_agent_has_empty_schema() {
        let mut agent = agent();
        assert!(agent.schema().unwrap().is_empty());
    }

    #[test]
    fn test_unique_field_conflict() {
        let mut other = item_schema("b");
        other.set_unique_field(Some("title".to_string()));

        let mut agent = agent();
        agent
            .attach_collection(Arc::new(MockCollection::new("a", 1)))
            .unwrap();
        agent
            .attach_collection(Arc::new(MockCollection::new("b", 1).with_schema(other)))
            .unwrap();

        match agent.schema().unwrap_err() {
            IndexingError::UniqueFieldConflict {
                collection,
                expected,
                found,
            } => {
                assert_eq!(collection, "b");
                assert_eq!(expected.as_deref(), Some("id"));
                assert_eq!(found.as_deref(), Some("title"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(agent.cached_schema().is_none());
    }

    #[test]
    fn test_field_definition_conflict() {
        let mut other = Schema::new().with_unique_field("id");
        other
            .add_field(SchemaField::new("id", FieldType::String))
            .unwrap();
        other
            .add_field(SchemaField::new("title", FieldType::String))
            .unwrap();

        let collections: Vec<Arc<dyn Collection>> = vec![
            Arc::new(MockCollection::new("a", 1)),
            Arc::new(MockCollection::new("b", 1).with_schema(other)),
        ];
        let err = fuse_schemas(&collections).unwrap_err();
        assert!(matches!(
            err,
            IndexingError::FieldConflict { collection, field } if collection == "b" && field == "title"
        ));
    }

    #[test]
    fn test_display_name_clash_is_field_conflict() {
        let mut other = Schema::new().with_unique_field("id");
        other
            .add_field(SchemaField::new("id", FieldType::String))
            .unwrap();
        other
            .add_field(SchemaField::new("heading", FieldType::Fulltext).with_name("title"))
            .unwrap();

        let collections: Vec<Arc<dyn Collection>> = vec![
            Arc::new(MockCollection::new("a", 1)),
            Arc::new(MockCollection::new("b", 1).with_schema(other)),
        ];
        let err = fuse_schemas(&collections).unwrap_err();
        assert!(matches!(
            err,
            IndexingError::FieldConflict { collection, field } if collection == "b" && field == "heading"
        ));
    }

    #[test]
    fn test_fusion_with_self_is_idempotent() {
        let schema = item_schema("a");
        let mut fused = schema.clone();
        merge_schema(&mut fused, "a", &schema).unwrap();
        assert_eq!(fused, schema);
    }

    #[test]
    fn test_first_schema_seeds_options() {
        let collections: Vec<Arc<dyn Collection>> = vec![
            Arc::new(MockCollection::new("first", 1)),
            Arc::new(MockCollection::new("second", 1)),
        ];
        let fused = fuse_schemas(&collections).unwrap();
        assert_eq!(fused.name(), Some("first"));
        assert_eq!(fused.unique_field(), Some("id"));
        assert_eq!(fused.field_ids(), vec!["id", "title"]);
    }

    #[test]
    fn test_dispatch_logs_around_event() {
        let logger = Arc::new(MemoryLogger::new());
        let agent = agent().with_logger(logger.clone());
        agent
            .dispatcher()
            .add_listener(names::COLLECTOR_PRE_QUEUE, |_| Ok(()));

        let mut event = Event::Queue(QueueEvent::default());
        let context = log_context([("run", json!(7))]);
        agent
            .dispatch(names::COLLECTOR_PRE_QUEUE, &mut event, context)
            .unwrap();

        let records = logger.records_at(LogLevel::Debug);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "Dispatching event");
        assert_eq!(records[1].message, "Event dispatched");
        assert_eq!(records[0].context["event"], json!(names::COLLECTOR_PRE_QUEUE));
        assert_eq!(records[1].context["run"], json!(7));
    }

    #[test]
    fn test_bounds_builders() {
        let agent = agent()
            .with_limit(Limit::Max(4))
            .with_timeout(Timeout::from_secs(9));
        assert_eq!(agent.bounds().limit, Limit::Max(4));
        assert_eq!(agent.bounds().timeout, Timeout::from_secs(9));
    }
}
