//! Collector: publishes every collection's scheduled items to the queue.

use searchkit_types::WorkerBounds;
use serde_json::json;

use crate::agent::CollectionAgent;
use crate::collection::Collection;
use crate::error::IndexingError;
use crate::events::{names, Event, QueueEvent};
use crate::logger::log_context;
use crate::worker::Producer;

/// Result of one collector run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueResult {
    /// Messages published across all collections
    pub total: usize,
    /// Messages published per collection, in attachment order
    pub by_collection: Vec<(String, usize)>,
}

impl QueueResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, collection_id: &str, count: usize) {
        self.total += count;
        self.by_collection.push((collection_id.to_string(), count));
    }

    pub fn count_for(&self, collection_id: &str) -> Option<usize> {
        self.by_collection
            .iter()
            .find(|(id, _)| id == collection_id)
            .map(|(_, count)| *count)
    }
}

/// Drains each collection through a [`Producer`] into the queue backend.
#[derive(Debug, Clone)]
pub struct Collector {
    agent: CollectionAgent,
}

impl Collector {
    pub fn new(agent: CollectionAgent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &CollectionAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut CollectionAgent {
        &mut self.agent
    }

    /// Queue the scheduled items of every attached collection.
    ///
    /// Collections are processed in attachment order. An error aborts the
    /// run, but messages already published stay in the queue.
    pub fn queue(&self) -> Result<QueueResult, IndexingError> {
        let agent = &self.agent;
        let mut result = QueueResult::new();

        let mut event = Event::Queue(QueueEvent::default());
        agent.dispatch(
            names::COLLECTOR_PRE_QUEUE,
            &mut event,
            log_context([("collections", json!(agent.collection_ids()))]),
        )?;

        for collection in agent.collections() {
            let count = self.queue_collection(collection.as_ref(), agent.bounds())?;
            result.record(collection.id(), count);
        }

        let mut event = Event::Queue(QueueEvent {
            collection_id: None,
            count: result.total,
        });
        agent.dispatch(
            names::COLLECTOR_POST_QUEUE,
            &mut event,
            log_context([("total", json!(result.total))]),
        )?;

        agent.logger().info(
            "Queued scheduled items",
            &log_context([
                ("total", json!(result.total)),
                ("queue", json!(agent.queue().name())),
            ]),
        );
        Ok(result)
    }

    fn queue_collection(
        &self,
        collection: &dyn Collection,
        bounds: WorkerBounds,
    ) -> Result<usize, IndexingError> {
        let agent = &self.agent;
        let collection_id = collection.id();
        let queue = agent.queue();

        let mut event = Event::Queue(QueueEvent {
            collection_id: Some(collection_id.to_string()),
            count: 0,
        });
        agent.dispatch(
            names::COLLECTION_PRE_QUEUE,
            &mut event,
            log_context([("collection", json!(collection_id))]),
        )?;

        let mut producer = Producer::new(collection, queue.as_ref(), bounds);
        for message in producer.by_ref() {
            queue.publish(message?)?;
        }
        let count = producer.yielded();

        let mut event = Event::Queue(QueueEvent {
            collection_id: Some(collection_id.to_string()),
            count,
        });
        agent.dispatch(
            names::COLLECTION_POST_QUEUE,
            &mut event,
            log_context([("collection", json!(collection_id)), ("count", json!(count))]),
        )?;

        agent.logger().debug(
            "Collection queued",
            &log_context([("collection", json!(collection_id)), ("count", json!(count))]),
        );
        Ok(count)
    }
}
