//! In-process reference queue backend.
//!
//! Messages live in a store shared by every connection opened with
//! [`MemoryQueue::reconnect`]. Nothing is persisted: the store disappears
//! with the last connection. Dropping a connection releases the messages
//! it claimed but never acknowledged, which is how a restarted consumer
//! gets them redelivered. Messages are stored in their JSON wire form, so
//! anything that does not survive encoding fails at publish time.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use searchkit_types::QueueMessage;

use crate::backend::QueueBackend;
use crate::error::QueueError;

#[derive(Debug)]
struct StoredMessage {
    sequence: u64,
    /// `QueueMessage` as JSON
    payload: Vec<u8>,
    /// Connection currently holding the message
    claimed_by: Option<u64>,
}

#[derive(Debug, Default)]
struct QueueStore {
    next_sequence: u64,
    next_connection: u64,
    messages: VecDeque<StoredMessage>,
}

impl QueueStore {
    fn open_connection(&mut self) -> u64 {
        self.next_connection += 1;
        self.next_connection
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connection to an in-memory message store.
#[derive(Debug)]
pub struct MemoryQueue {
    connection: u64,
    store: Arc<Mutex<QueueStore>>,
    consumed: Mutex<Vec<QueueMessage>>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    /// Create an empty store and open the first connection to it.
    pub fn new() -> Self {
        let mut store = QueueStore::default();
        let connection = store.open_connection();
        Self {
            connection,
            store: Arc::new(Mutex::new(store)),
            consumed: Mutex::new(Vec::new()),
        }
    }

    /// Open another connection to the same store.
    ///
    /// The new connection has an empty consumed log. Messages claimed by
    /// other live connections are not delivered to it.
    pub fn reconnect(&self) -> Self {
        let connection = lock(&self.store).open_connection();
        debug!(connection, "Opened memory queue connection");
        Self {
            connection,
            store: Arc::clone(&self.store),
            consumed: Mutex::new(Vec::new()),
        }
    }

    /// Total messages held, claimed or not.
    pub fn len(&self) -> usize {
        lock(&self.store).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages available for delivery.
    pub fn pending(&self) -> usize {
        lock(&self.store)
            .messages
            .iter()
            .filter(|m| m.claimed_by.is_none())
            .count()
    }

    /// Messages claimed by any connection and not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.len() - self.pending()
    }
}

impl QueueBackend for MemoryQueue {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&self, mut message: QueueMessage) -> Result<(), QueueError> {
        message.id = None;
        let payload = message.to_bytes()?;
        let mut store = lock(&self.store);
        store.next_sequence += 1;
        let sequence = store.next_sequence;
        store.messages.push_back(StoredMessage {
            sequence,
            payload,
            claimed_by: None,
        });
        trace!(sequence, "Published message");
        Ok(())
    }

    fn consume(&self) -> Result<Option<QueueMessage>, QueueError> {
        let mut store = lock(&self.store);
        let Some(stored) = store.messages.iter_mut().find(|m| m.claimed_by.is_none()) else {
            return Ok(None);
        };

        let mut message = QueueMessage::from_bytes(&stored.payload)?;
        message.id = Some(stored.sequence);
        stored.claimed_by = Some(self.connection);
        drop(store);

        lock(&self.consumed).push(message.clone());
        trace!(id = ?message.id, "Consumed message");
        Ok(Some(message))
    }

    fn acknowledge(&self, success: bool) -> usize {
        let consumed = std::mem::take(&mut *lock(&self.consumed));
        if consumed.is_empty() {
            return 0;
        }

        if success {
            let ids: HashSet<u64> = consumed.iter().filter_map(|m| m.id).collect();
            let mut store = lock(&self.store);
            let connection = self.connection;
            store
                .messages
                .retain(|m| !(m.claimed_by == Some(connection) && ids.contains(&m.sequence)));
        }

        debug!(
            count = consumed.len(),
            success, "Acknowledged consumed messages"
        );
        consumed.len()
    }

    fn consumed(&self) -> Vec<QueueMessage> {
        lock(&self.consumed).clone()
    }

    fn consumed_count(&self) -> usize {
        lock(&self.consumed).len()
    }
}

impl Drop for MemoryQueue {
    fn drop(&mut self) {
        let mut store = lock(&self.store);
        let mut released = 0;
        for stored in store.messages.iter_mut() {
            if stored.claimed_by == Some(self.connection) {
                stored.claimed_by = None;
                released += 1;
            }
        }
        if released > 0 {
            debug!(
                connection = self.connection,
                released, "Released unacknowledged messages"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_items(queue: &MemoryQueue, count: usize) {
        for i in 0..count {
            let message = queue
                .new_message()
                .with_body(format!("item-{}", i))
                .with_collection("docs");
            queue.publish(message).unwrap();
        }
    }

    #[test]
    fn test_consume_empty_returns_none() {
        let queue = MemoryQueue::new();
        assert!(queue.consume().unwrap().is_none());
        assert_eq!(queue.consumed_count(), 0);
    }

    #[test]
    fn test_fifo_order_and_ids() {
        let queue = MemoryQueue::new();
        publish_items(&queue, 3);

        let first = queue.consume().unwrap().unwrap();
        let second = queue.consume().unwrap().unwrap();
        assert_eq!(first.body(), "item-0");
        assert_eq!(second.body(), "item-1");
        assert_eq!(first.id(), Some(1));
        assert_eq!(second.id(), Some(2));
        assert_eq!(first.collection_id(), Some("docs"));
    }

    #[test]
    fn test_publish_discards_id() {
        let queue = MemoryQueue::new();
        let mut message = QueueMessage::new().with_body("x");
        message.id = Some(999);
        queue.publish(message).unwrap();

        let consumed = queue.consume().unwrap().unwrap();
        assert_eq!(consumed.id(), Some(1));
    }

    #[test]
    fn test_message_fields_survive_storage() {
        let queue = MemoryQueue::new();
        let mut message = queue
            .new_message()
            .with_body("posts/42")
            .with_collection("posts");
        message.set_error(true);
        queue.publish(message).unwrap();

        let consumed = queue.consume().unwrap().unwrap();
        assert_eq!(consumed.body(), "posts/42");
        assert_eq!(consumed.collection_id(), Some("posts"));
        assert!(consumed.is_error());
        assert_eq!(consumed.id(), Some(1));
    }

    #[test]
    fn test_consumed_log() {
        let queue = MemoryQueue::new();
        publish_items(&queue, 2);
        queue.consume().unwrap();
        queue.consume().unwrap();

        assert_eq!(queue.consumed_count(), 2);
        assert_eq!(queue.consumed()[1].body(), "item-1");
        assert_eq!(queue.in_flight(), 2);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_acknowledge_success_removes_messages() {
        let queue = MemoryQueue::new();
        publish_items(&queue, 5);
        while queue.consume().unwrap().is_some() {}

        assert_eq!(queue.acknowledge(true), 5);
        assert_eq!(queue.consumed_count(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_acknowledge_only_covers_consumed() {
        let queue = MemoryQueue::new();
        publish_items(&queue, 4);
        queue.consume().unwrap();
        queue.consume().unwrap();

        queue.acknowledge(true);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.consume().unwrap().unwrap().body(), "item-2");
    }

    #[test]
    fn test_acknowledge_failure_keeps_messages_claimed() {
        let queue = MemoryQueue::new();
        publish_items(&queue, 3);
        while queue.consume().unwrap().is_some() {}

        assert_eq!(queue.acknowledge(false), 3);
        assert_eq!(queue.consumed_count(), 0);
        assert_eq!(queue.len(), 3);
        // still claimed by this connection, so not handed out again here
        assert!(queue.consume().unwrap().is_none());
    }

    #[test]
    fn test_dropped_connection_releases_claims() {
        let queue = MemoryQueue::new();
        publish_items(&queue, 5);
        while queue.consume().unwrap().is_some() {}

        let restarted = queue.reconnect();
        assert!(restarted.consume().unwrap().is_none());
        drop(queue);

        let mut redelivered = Vec::new();
        while let Some(message) = restarted.consume().unwrap() {
            redelivered.push(message.body().to_string());
        }
        assert_eq!(
            redelivered,
            vec!["item-0", "item-1", "item-2", "item-3", "item-4"]
        );

        restarted.acknowledge(true);
        assert!(restarted.is_empty());
    }

    #[test]
    fn test_acknowledge_without_consumption() {
        let queue = MemoryQueue::new();
        publish_items(&queue, 1);
        assert_eq!(queue.acknowledge(true), 0);
        assert_eq!(queue.len(), 1);
    }
}
