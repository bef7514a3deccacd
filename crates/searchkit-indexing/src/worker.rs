//! Bounded, restartable message sequences.
//!
//! [`Producer`] turns a collection's scheduled items into queue messages;
//! [`Consumer`] pulls messages off a queue backend. Both stop when either
//! the limit or the deadline trips, checked before every pull. Starting
//! (or calling `reset`) zeroes the count and recomputes the deadline from
//! the current time.

use searchkit_queue::QueueBackend;
use searchkit_types::{Deadline, QueueMessage, WorkerBounds};
use tracing::debug;

use crate::collection::{Collection, ScheduledItems};
use crate::error::IndexingError;

/// Yields one queue message per scheduled item of a collection.
///
/// Messages are stamped with the collection id. Publishing them is the
/// caller's job.
pub struct Producer<'a> {
    collection: &'a dyn Collection,
    queue: &'a dyn QueueBackend,
    bounds: WorkerBounds,
    items: Option<ScheduledItems<'a>>,
    deadline: Option<Deadline>,
    count: usize,
}

impl<'a> Producer<'a> {
    pub fn new(
        collection: &'a dyn Collection,
        queue: &'a dyn QueueBackend,
        bounds: WorkerBounds,
    ) -> Self {
        Self {
            collection,
            queue,
            bounds,
            items: None,
            deadline: None,
            count: 0,
        }
    }

    /// Start over with a fresh scan of the collection.
    pub fn reset(&mut self) -> Result<(), IndexingError> {
        self.count = 0;
        self.deadline = Some(self.bounds.timeout.start());
        self.items = None;
        self.items = Some(self.collection.fetch_scheduled_items(self.bounds.limit)?);
        debug!(collection = self.collection.id(), "Producer started");
        Ok(())
    }

    /// Messages yielded since the last (re)start.
    pub fn yielded(&self) -> usize {
        self.count
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    fn is_done(&self) -> bool {
        let timed_out = self.deadline.is_some_and(|d| d.is_expired());
        timed_out || self.bounds.limit.is_exceeded_by(self.count + 1)
    }
}

impl Iterator for Producer<'_> {
    type Item = Result<QueueMessage, IndexingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.deadline.is_none() {
            if let Err(e) = self.reset() {
                return Some(Err(e));
            }
        }
        if self.is_done() {
            return None;
        }

        let item = self.items.as_mut()?.next()?;
        let mut message = self
            .queue
            .new_message()
            .with_collection(self.collection.id());
        if let Err(e) = self.collection.build_queue_message(&mut message, &item) {
            return Some(Err(e));
        }
        self.count += 1;
        Some(Ok(message))
    }
}

/// Pulls messages from a queue backend.
///
/// Every message yielded is in the backend's consumed log until the next
/// acknowledgement. [`Consumer::dequeued`] counts messages taken off the
/// queue, not messages indexed.
pub struct Consumer<'a> {
    queue: &'a dyn QueueBackend,
    bounds: WorkerBounds,
    deadline: Option<Deadline>,
    count: usize,
}

impl<'a> Consumer<'a> {
    pub fn new(queue: &'a dyn QueueBackend, bounds: WorkerBounds) -> Self {
        Self {
            queue,
            bounds,
            deadline: None,
            count: 0,
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.deadline = Some(self.bounds.timeout.start());
        debug!(queue = self.queue.name(), "Consumer started");
    }

    /// Messages dequeued since the last (re)start.
    pub fn dequeued(&self) -> usize {
        self.count
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }
}

impl Iterator for Consumer<'_> {
    type Item = Result<QueueMessage, IndexingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let deadline = match self.deadline {
            Some(deadline) => deadline,
            None => {
                self.reset();
                self.deadline?
            }
        };
        if deadline.is_expired() || self.bounds.limit.is_exceeded_by(self.count + 1) {
            return None;
        }

        match self.queue.consume() {
            Ok(Some(message)) => {
                self.count += 1;
                Some(Ok(message))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCollection;
    use searchkit_queue::MemoryQueue;
    use searchkit_types::{Limit, Timeout};

    fn publish_all(producer: &mut Producer<'_>, queue: &MemoryQueue) -> usize {
        let mut published = 0;
        for message in producer.by_ref() {
            queue.publish(message.unwrap()).unwrap();
            published += 1;
        }
        published
    }

    #[test]
    fn test_producer_limit_is_inclusive() {
        let collection = MockCollection::new("docs", 10);
        let queue = MemoryQueue::new();
        let bounds = WorkerBounds::unbounded().with_limit(Limit::Max(3));
        let mut producer = Producer::new(&collection, &queue, bounds);

        assert_eq!(publish_all(&mut producer, &queue), 3);
        assert_eq!(producer.yielded(), 3);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_producer_stamps_collection() {
        let collection = MockCollection::new("docs", 2);
        let queue = MemoryQueue::new();
        let mut producer = Producer::new(&collection, &queue, WorkerBounds::unbounded());

        let message = producer.next().unwrap().unwrap();
        assert_eq!(message.collection_id(), Some("docs"));
        assert_eq!(message.body(), "docs-0");
        assert_eq!(message.id(), None);
    }

    #[test]
    fn test_zero_timeout_yields_nothing() {
        let collection = MockCollection::new("docs", 5);
        let queue = MemoryQueue::new();
        let bounds = WorkerBounds::unbounded().with_timeout(Timeout::from_secs(0));

        let mut producer = Producer::new(&collection, &queue, bounds);
        assert!(producer.next().is_none());
        assert_eq!(producer.yielded(), 0);

        for i in 0..5 {
            queue
                .publish(QueueMessage::new().with_body(format!("m{i}")))
                .unwrap();
        }
        let mut consumer = Consumer::new(&queue, bounds);
        assert!(consumer.next().is_none());
        assert_eq!(queue.pending(), 5);
    }

    #[test]
    fn test_producer_reset_rescans() {
        let collection = MockCollection::new("docs", 4);
        let queue = MemoryQueue::new();
        let bounds = WorkerBounds::unbounded().with_limit(Limit::Max(2));
        let mut producer = Producer::new(&collection, &queue, bounds);

        assert_eq!(publish_all(&mut producer, &queue), 2);
        let first_deadline = producer.deadline().unwrap();

        producer.reset().unwrap();
        assert_eq!(producer.yielded(), 0);
        assert!(producer.deadline().unwrap() >= first_deadline);
        let bodies: Vec<String> = producer
            .by_ref()
            .map(|m| m.unwrap().body().to_string())
            .collect();
        assert_eq!(bodies, vec!["docs-0", "docs-1"]);
    }

    #[test]
    fn test_consumer_limit_and_count() {
        let queue = MemoryQueue::new();
        for i in 0..5 {
            queue
                .publish(QueueMessage::new().with_body(format!("m{i}")))
                .unwrap();
        }
        let bounds = WorkerBounds::unbounded().with_limit(Limit::Max(3));
        let mut consumer = Consumer::new(&queue, bounds);
        let consumed: Vec<_> = consumer.by_ref().map(|m| m.unwrap()).collect();

        assert_eq!(consumed.len(), 3);
        assert_eq!(consumer.dequeued(), 3);
        assert_eq!(queue.consumed_count(), 3);
        assert_eq!(queue.pending(), 2);
    }

    #[test]
    fn test_unbounded_drains_large_source() {
        let count = 5_000;
        let collection = MockCollection::new("bulk", count);
        let queue = MemoryQueue::new();
        let mut producer = Producer::new(&collection, &queue, WorkerBounds::unbounded());
        assert_eq!(publish_all(&mut producer, &queue), count);

        let mut consumer = Consumer::new(&queue, WorkerBounds::unbounded());
        assert_eq!(consumer.by_ref().count(), count);
        assert_eq!(consumer.dequeued(), count);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_consumer_restart_after_refill() {
        let queue = MemoryQueue::new();
        let mut consumer = Consumer::new(&queue, WorkerBounds::unbounded());
        assert!(consumer.next().is_none());

        queue.publish(QueueMessage::new().with_body("late")).unwrap();
        consumer.reset();
        assert_eq!(consumer.next().unwrap().unwrap().body(), "late");
        assert_eq!(consumer.dequeued(), 1);
    }
}
