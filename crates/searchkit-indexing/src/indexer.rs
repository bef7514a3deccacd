//! Indexer: drains the queue into the search engine.
//!
//! A run forces schema fusion first, so conflicts surface before any
//! document reaches the engine. The engine is subscribed to the dispatcher
//! only for the duration of [`Indexer::index_queued_items`]; the
//! subscription is a drop guard, released on every exit path.
//!
//! Per message:
//! - no attached collection, or flagged as error: warning, skipped
//! - source data missing: critical log entry, skipped
//! - otherwise the document is built and handed to the engine between
//!   [`names::DOCUMENT_PRE_INDEX`] and [`names::DOCUMENT_POST_INDEX`]
//!
//! Any error aborts the drain. Consumed messages are then acknowledged as
//! failed and stay claimed for redelivery.

use std::sync::Arc;

use searchkit_types::{QueueMessage, Schema};
use serde_json::{json, Value};

use crate::agent::CollectionAgent;
use crate::collection::is_falsy;
use crate::collector::{Collector, QueueResult};
use crate::engine::{EngineSubscriber, SearchEngine};
use crate::error::IndexingError;
use crate::events::{names, DocumentEvent, Event, IndexEvent};
use crate::logger::{log_context, LogContext};
use crate::worker::Consumer;

/// Result of one indexer run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexResult {
    /// Messages published by the collector (full cycles only)
    pub queued: usize,
    /// Messages taken off the queue
    pub consumed: usize,
    /// Documents handed to the search engine
    pub indexed: usize,
    /// Messages skipped without indexing
    pub skipped: usize,
}

impl IndexResult {
    pub fn new() -> Self {
        Self::default()
    }

    fn as_event(&self) -> IndexEvent {
        IndexEvent {
            consumed: self.consumed,
            indexed: self.indexed,
            skipped: self.skipped,
        }
    }
}

/// Outcome of a single consumed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageOutcome {
    Indexed,
    Skipped,
}

/// Queue-then-index driver around a [`SearchEngine`].
#[derive(Clone)]
pub struct Indexer {
    agent: CollectionAgent,
    engine: Arc<dyn SearchEngine>,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("agent", &self.agent)
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl Indexer {
    pub fn new(agent: CollectionAgent, engine: Arc<dyn SearchEngine>) -> Self {
        Self { agent, engine }
    }

    pub fn agent(&self) -> &CollectionAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut CollectionAgent {
        &mut self.agent
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    /// Fused schema of the attached collections.
    pub fn schema(&mut self) -> Result<Arc<Schema>, IndexingError> {
        self.agent.schema()
    }

    /// A collector sharing this indexer's collections, queue and dispatcher.
    pub fn new_collector(&self) -> Collector {
        Collector::new(self.agent.clone())
    }

    /// Queue every collection's scheduled items, then drain the queue.
    pub fn index(&mut self) -> Result<IndexResult, IndexingError> {
        let QueueResult { total, .. } = self.new_collector().queue()?;
        let mut result = self.index_queued_items()?;
        result.queued = total;
        Ok(result)
    }

    /// Drain the queue into the search engine.
    pub fn index_queued_items(&mut self) -> Result<IndexResult, IndexingError> {
        self.agent.schema()?;

        let dispatcher = Arc::clone(self.agent.dispatcher());
        let subscriber = Arc::new(EngineSubscriber::new(Arc::clone(&self.engine)));
        let subscription = dispatcher.scoped_subscriber(subscriber);
        let outcome = self.drain();
        drop(subscription);

        let queue = self.agent.queue();
        match outcome {
            Ok(result) => {
                queue.acknowledge(true);
                self.agent.logger().info(
                    "Indexed queued items",
                    &log_context([
                        ("engine", json!(self.engine.name())),
                        ("consumed", json!(result.consumed)),
                        ("indexed", json!(result.indexed)),
                        ("skipped", json!(result.skipped)),
                    ]),
                );
                Ok(result)
            }
            Err(e) => {
                let released = queue.acknowledge(false);
                self.agent.logger().critical(
                    "Indexing aborted",
                    &log_context([
                        ("engine", json!(self.engine.name())),
                        ("error", json!(e.to_string())),
                        ("unacknowledged", json!(released)),
                    ]),
                );
                Err(e)
            }
        }
    }

    fn drain(&self) -> Result<IndexResult, IndexingError> {
        let agent = &self.agent;
        let mut result = IndexResult::new();

        let mut event = Event::Index(result.as_event());
        agent.dispatch(
            names::INDEXER_PRE_INDEX,
            &mut event,
            log_context([("engine", json!(self.engine.name()))]),
        )?;

        let mut consumer = Consumer::new(agent.queue().as_ref(), agent.bounds());
        for message in consumer.by_ref() {
            let message = message?;
            result.consumed += 1;
            match self.index_message(&message)? {
                MessageOutcome::Indexed => result.indexed += 1,
                MessageOutcome::Skipped => result.skipped += 1,
            }
        }

        let mut event = Event::Index(result.as_event());
        agent.dispatch(
            names::INDEXER_POST_INDEX,
            &mut event,
            log_context([
                ("engine", json!(self.engine.name())),
                ("consumed", json!(result.consumed)),
            ]),
        )?;
        Ok(result)
    }

    fn index_message(&self, message: &QueueMessage) -> Result<MessageOutcome, IndexingError> {
        let agent = &self.agent;
        let context = message_context(message);

        let Some(collection) = message.collection_id().and_then(|id| agent.collection(id)) else {
            agent
                .logger()
                .warning("Queued item has no attached collection", &context);
            return Ok(MessageOutcome::Skipped);
        };

        if message.is_error() {
            agent
                .logger()
                .warning("Queued item was flagged with an error", &context);
            return Ok(MessageOutcome::Skipped);
        }

        let data = collection
            .load_source_data(message)?
            .filter(|data| !is_falsy(data));
        let Some(data) = data else {
            agent
                .logger()
                .critical("Source data could not be loaded", &context);
            return Ok(MessageOutcome::Skipped);
        };

        let mut document = self.engine.new_document(agent.field_context());
        collection.build_document(&mut document, &data)?;

        let mut event = Event::Document(DocumentEvent {
            collection_id: collection.id(),
            document: &mut document,
        });
        agent.dispatch(names::DOCUMENT_PRE_INDEX, &mut event, context.clone())?;
        drop(event);

        self.engine.index_document(collection.as_ref(), &document)?;

        let mut event = Event::Document(DocumentEvent {
            collection_id: collection.id(),
            document: &mut document,
        });
        agent.dispatch(names::DOCUMENT_POST_INDEX, &mut event, context)?;
        Ok(MessageOutcome::Indexed)
    }

    /// Create the backend index for the fused schema.
    pub fn create_index(&mut self, options: &Value) -> Result<(), IndexingError> {
        let schema = self.agent.schema()?;
        self.engine.create_index(&schema, options)?;
        self.agent.logger().notice(
            "Index created",
            &log_context([
                ("engine", json!(self.engine.name())),
                ("fields", json!(schema.field_ids())),
            ]),
        );
        Ok(())
    }

    pub fn search(&self, keywords: &str, options: &Value) -> Result<Value, IndexingError> {
        self.engine.search(keywords, options)
    }

    pub fn delete_index(&self) -> Result<(), IndexingError> {
        self.engine.delete()?;
        self.agent.logger().notice(
            "Index deleted",
            &log_context([("engine", json!(self.engine.name()))]),
        );
        Ok(())
    }
}

fn message_context(message: &QueueMessage) -> LogContext {
    log_context([
        ("collection", json!(message.collection_id())),
        ("item", json!(message.body())),
        ("message_id", json!(message.id())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{LogLevel, MemoryLogger};
    use crate::testing::{item_schema, MockCollection, RecordingEngine};
    use searchkit_queue::{MemoryQueue, QueueBackend};
    use searchkit_types::{FieldType, Limit, SchemaField};

    struct Fixture {
        queue: Arc<MemoryQueue>,
        logger: Arc<MemoryLogger>,
        engine: Arc<RecordingEngine>,
        indexer: Indexer,
    }

    fn fixture(collections: Vec<MockCollection>, engine: Arc<RecordingEngine>) -> Fixture {
        let queue = Arc::new(MemoryQueue::new());
        let logger = Arc::new(MemoryLogger::new());
        let mut agent = CollectionAgent::new(queue.clone()).with_logger(logger.clone());
        for collection in collections {
            agent.attach_collection(Arc::new(collection)).unwrap();
        }
        let indexer = Indexer::new(agent, engine.clone());
        Fixture {
            queue,
            logger,
            engine,
            indexer,
        }
    }

    #[test]
    fn test_index_full_cycle() {
        let mut f = fixture(vec![MockCollection::new("docs", 3)], RecordingEngine::new());

        let result = f.indexer.index().unwrap();
        assert_eq!(
            result,
            IndexResult {
                queued: 3,
                consumed: 3,
                indexed: 3,
                skipped: 0,
            }
        );
        assert_eq!(f.engine.indexed_ids(), vec!["docs-0", "docs-1", "docs-2"]);
        assert!(f.queue.is_empty());
        assert_eq!(f.queue.consumed_count(), 0);
    }

    #[test]
    fn test_missing_source_is_skipped_with_critical_log() {
        let collection = MockCollection::new("docs", 3).with_missing("docs-1");
        let mut f = fixture(vec![collection], RecordingEngine::new());

        let result = f.indexer.index().unwrap();
        assert_eq!(result.indexed, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(f.engine.indexed_ids(), vec!["docs-0", "docs-2"]);

        let critical = f.logger.records_at(LogLevel::Critical);
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].context["item"], json!("docs-1"));
    }

    #[test]
    fn test_removed_collection_and_error_flag_are_skipped() {
        let mut f = fixture(
            vec![MockCollection::new("a", 1), MockCollection::new("b", 1)],
            RecordingEngine::new(),
        );
        f.indexer.new_collector().queue().unwrap();
        let mut flagged = QueueMessage::new().with_body("a-9").with_collection("a");
        flagged.set_error(true);
        f.queue.publish(flagged).unwrap();
        f.indexer.agent_mut().remove_collection("b");

        let result = f.indexer.index_queued_items().unwrap();
        assert_eq!(result.consumed, 3);
        assert_eq!(result.indexed, 1);
        assert_eq!(result.skipped, 2);
        assert_eq!(f.logger.count(LogLevel::Warning), 2);
        assert_eq!(f.logger.count(LogLevel::Critical), 0);
    }

    #[test]
    fn test_engine_subscription_is_scoped() {
        let mut f = fixture(vec![MockCollection::new("docs", 2)], RecordingEngine::new());
        let dispatcher = Arc::clone(f.indexer.agent().dispatcher());
        let during = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = Arc::clone(&during);
        let observed = Arc::clone(&dispatcher);
        dispatcher.add_listener(names::DOCUMENT_PRE_INDEX, move |_| {
            seen.lock()
                .unwrap()
                .push(observed.has_listeners(names::FIELD_NORMALIZE));
            Ok(())
        });

        f.indexer.index().unwrap();
        assert_eq!(*during.lock().unwrap(), vec![true, true]);
        assert!(!dispatcher.has_listeners(names::FIELD_NORMALIZE));
    }

    #[test]
    fn test_engine_failure_unsubscribes_and_keeps_messages() {
        let mut f = fixture(
            vec![MockCollection::new("docs", 3)],
            RecordingEngine::failing_on("docs-1"),
        );
        let dispatcher = Arc::clone(f.indexer.agent().dispatcher());

        let err = f.indexer.index().unwrap_err();
        assert!(matches!(err, IndexingError::Engine(_)));
        assert_eq!(dispatcher.registration_count(), 0);
        assert_eq!(f.engine.indexed_ids(), vec!["docs-0"]);
        assert_eq!(f.queue.len(), 3);
        assert_eq!(f.queue.in_flight(), 2);
        assert_eq!(f.queue.consumed_count(), 0);
        assert_eq!(f.logger.count(LogLevel::Critical), 1);
    }

    #[test]
    fn test_schema_conflict_fails_before_indexing() {
        let mut conflicting = item_schema("b");
        conflicting.remove_field("title");
        conflicting
            .add_field(SchemaField::new("title", FieldType::String))
            .unwrap();
        let mut f = fixture(
            vec![
                MockCollection::new("a", 2),
                MockCollection::new("b", 2).with_schema(conflicting),
            ],
            RecordingEngine::new(),
        );
        f.indexer.new_collector().queue().unwrap();

        let err = f.indexer.index_queued_items().unwrap_err();
        assert!(matches!(err, IndexingError::FieldConflict { .. }));
        assert!(f.engine.indexed_ids().is_empty());
        assert_eq!(f.queue.pending(), 4);
    }

    #[test]
    fn test_document_events_see_document() {
        let mut f = fixture(vec![MockCollection::new("docs", 1)], RecordingEngine::new());
        f.indexer
            .agent()
            .dispatcher()
            .add_listener(names::DOCUMENT_PRE_INDEX, |event| {
                let doc = event.as_document_mut().unwrap();
                let collection = doc.collection_id.to_string();
                doc.document.set("source", collection)?;
                Ok(())
            });

        f.indexer.index().unwrap();
        let documents = f.engine.documents.lock().unwrap();
        assert_eq!(documents[0]["source"], json!("docs"));
    }

    #[test]
    fn test_indexer_events_report_counts() {
        let collection = MockCollection::new("docs", 3).with_missing("docs-0");
        let mut f = fixture(vec![collection], RecordingEngine::new());
        let post = Arc::new(std::sync::Mutex::new(None));
        let slot = Arc::clone(&post);
        f.indexer
            .agent()
            .dispatcher()
            .add_listener(names::INDEXER_POST_INDEX, move |event| {
                if let Event::Index(index) = event {
                    *slot.lock().unwrap() = Some(index.clone());
                }
                Ok(())
            });

        f.indexer.index().unwrap();
        assert_eq!(
            *post.lock().unwrap(),
            Some(IndexEvent {
                consumed: 3,
                indexed: 2,
                skipped: 1,
            })
        );
    }

    #[test]
    fn test_limit_bounds_consumption() {
        let mut f = fixture(vec![MockCollection::new("docs", 5)], RecordingEngine::new());
        f.indexer.new_collector().queue().unwrap();
        let agent = f.indexer.agent().clone().with_limit(Limit::Max(2));
        *f.indexer.agent_mut() = agent;

        let result = f.indexer.index_queued_items().unwrap();
        assert_eq!(result.consumed, 2);
        assert_eq!(f.queue.len(), 3);
    }

    #[test]
    fn test_create_search_delete() {
        let mut f = fixture(vec![MockCollection::new("docs", 2)], RecordingEngine::new());
        f.indexer.create_index(&json!({"shards": 1})).unwrap();
        {
            let created = f.engine.created.lock().unwrap();
            assert_eq!(created[0]["fields"], json!(["id", "title"]));
            assert_eq!(created[0]["options"]["shards"], json!(1));
        }

        f.indexer.index().unwrap();
        let hits = f.indexer.search("docs-1", &Value::Null).unwrap();
        assert_eq!(hits["hits"].as_array().unwrap().len(), 1);

        f.indexer.delete_index().unwrap();
        assert!(f.engine.indexed_ids().is_empty());
        assert_eq!(f.logger.count(LogLevel::Notice), 2);
    }

    #[test]
    fn test_normalizers_apply_on_read_during_indexing() {
        let mut schema = item_schema("docs");
        schema
            .add_field(SchemaField::new("flag", FieldType::Boolean))
            .unwrap();
        let engine = Arc::new(RecordingEngine {
            normalizers: crate::normalizer::NormalizerSet::with_defaults(),
            ..RecordingEngine::default()
        });
        let mut f = fixture(
            vec![MockCollection::new("docs", 1).with_schema(schema)],
            engine,
        );
        f.indexer
            .agent()
            .dispatcher()
            .add_listener(names::DOCUMENT_PRE_INDEX, |event| {
                event.as_document_mut().unwrap().document.set("flag", "yes")?;
                Ok(())
            });

        f.indexer.index().unwrap();
        let documents = f.engine.documents.lock().unwrap();
        assert_eq!(documents[0]["flag"], json!("true"));
    }
}
