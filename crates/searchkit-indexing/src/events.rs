//! Synchronous event dispatch.
//!
//! One [`EventDispatcher`] is created at the top of a pipeline run and
//! shared (through `Arc`) by the agents and every document they build.
//! Handlers run in registration order; the first handler error stops the
//! dispatch and is returned to the caller.

use std::sync::{Arc, PoisonError, RwLock};

use searchkit_types::{FieldType, FieldValue};
use tracing::trace;

use crate::document::IndexDocument;
use crate::error::IndexingError;

/// Event names dispatched by the pipeline.
pub mod names {
    /// Before a collector queues any collection
    pub const COLLECTOR_PRE_QUEUE: &str = "searchkit.collector.pre_queue";
    /// After a collector queued every collection
    pub const COLLECTOR_POST_QUEUE: &str = "searchkit.collector.post_queue";
    /// Before one collection's scheduled items are queued
    pub const COLLECTION_PRE_QUEUE: &str = "searchkit.collection.pre_queue";
    /// After one collection's scheduled items are queued
    pub const COLLECTION_POST_QUEUE: &str = "searchkit.collection.post_queue";
    /// Before the indexer drains the queue
    pub const INDEXER_PRE_INDEX: &str = "searchkit.indexer.pre_index";
    /// After the indexer drained the queue
    pub const INDEXER_POST_INDEX: &str = "searchkit.indexer.post_index";
    /// Before a document is handed to the search engine
    pub const DOCUMENT_PRE_INDEX: &str = "searchkit.document.pre_index";
    /// After a document was handed to the search engine
    pub const DOCUMENT_POST_INDEX: &str = "searchkit.document.post_index";
    /// When a field is attached; the settled value is stored
    pub const FIELD_ENRICH: &str = "searchkit.field.enrich";
    /// When a field value is read; the settled value is returned, not stored
    pub const FIELD_NORMALIZE: &str = "searchkit.field.normalize";
}

/// Payload of collector and collection events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueEvent {
    /// Set for per-collection events
    pub collection_id: Option<String>,
    /// Messages published so far
    pub count: usize,
}

/// Payload of indexer-wide events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEvent {
    pub consumed: usize,
    pub indexed: usize,
    pub skipped: usize,
}

/// Payload of per-document events.
#[derive(Debug)]
pub struct DocumentEvent<'a> {
    pub collection_id: &'a str,
    pub document: &'a mut IndexDocument,
}

/// Payload of field enrich/normalize events.
///
/// Handlers rewrite `value`; whatever it holds when dispatch returns is
/// the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEvent {
    pub field_id: String,
    pub field_name: String,
    /// Type from the fused schema, if the field is defined there
    pub field_type: Option<FieldType>,
    pub value: FieldValue,
}

/// An event passed to handlers.
#[derive(Debug)]
pub enum Event<'a> {
    Queue(QueueEvent),
    Index(IndexEvent),
    Document(DocumentEvent<'a>),
    Field(FieldEvent),
}

impl<'a> Event<'a> {
    pub fn as_field_mut(&mut self) -> Option<&mut FieldEvent> {
        match self {
            Event::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut DocumentEvent<'a>> {
        match self {
            Event::Document(document) => Some(document),
            _ => None,
        }
    }
}

/// A single-event handler.
pub type Listener = Arc<dyn Fn(&mut Event<'_>) -> Result<(), IndexingError> + Send + Sync>;

/// A handler for several events at once.
pub trait EventSubscriber: Send + Sync {
    /// Event names this subscriber wants.
    fn subscribed_events(&self) -> Vec<&'static str>;

    fn on_event(&self, name: &str, event: &mut Event<'_>) -> Result<(), IndexingError>;
}

/// Handle returned on registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
enum Handler {
    Listener(Listener),
    Subscriber(Arc<dyn EventSubscriber>),
}

struct Registration {
    id: ListenerId,
    event: String,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

/// Routes events to registered listeners and subscribers.
#[derive(Default)]
pub struct EventDispatcher {
    registry: RwLock<Registry>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("registrations", &self.registration_count())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for one event.
    pub fn add_listener<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&mut Event<'_>) -> Result<(), IndexingError> + Send + Sync + 'static,
    {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let id = registry.allocate();
        registry.registrations.push(Registration {
            id,
            event: event.to_string(),
            handler: Handler::Listener(Arc::new(listener)),
        });
        id
    }

    /// Register a subscriber for every event it names.
    ///
    /// All of its registrations share the returned id.
    pub fn add_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) -> ListenerId {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let id = registry.allocate();
        for event in subscriber.subscribed_events() {
            registry.registrations.push(Registration {
                id,
                event: event.to_string(),
                handler: Handler::Subscriber(Arc::clone(&subscriber)),
            });
        }
        id
    }

    /// Remove everything registered under `id`. Returns whether anything
    /// was removed.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let before = registry.registrations.len();
        registry.registrations.retain(|r| r.id != id);
        before != registry.registrations.len()
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.remove(id)
    }

    pub fn remove_subscriber(&self, id: ListenerId) -> bool {
        self.remove(id)
    }

    /// Register a subscriber until the returned guard is dropped.
    pub fn scoped_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) -> ScopedSubscription<'_> {
        let id = self.add_subscriber(subscriber);
        ScopedSubscription {
            dispatcher: self,
            id,
        }
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registrations
            .iter()
            .any(|r| r.id == id)
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registrations
            .iter()
            .filter(|r| r.event == event)
            .count()
    }

    /// Total registrations across all events.
    pub fn registration_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registrations
            .len()
    }

    /// Run every handler registered for `name`, in registration order.
    ///
    /// Handlers are snapshotted first, so a handler may dispatch further
    /// events or change registrations without deadlocking.
    pub fn dispatch(&self, name: &str, event: &mut Event<'_>) -> Result<(), IndexingError> {
        let handlers: Vec<Handler> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registrations
            .iter()
            .filter(|r| r.event == name)
            .map(|r| r.handler.clone())
            .collect();

        trace!(event = name, handlers = handlers.len(), "Dispatching");
        for handler in handlers {
            match handler {
                Handler::Listener(listener) => listener(event)?,
                Handler::Subscriber(subscriber) => subscriber.on_event(name, event)?,
            }
        }
        Ok(())
    }
}

/// Unregisters its subscriber when dropped.
#[must_use = "the subscriber is removed as soon as the guard is dropped"]
pub struct ScopedSubscription<'a> {
    dispatcher: &'a EventDispatcher,
    id: ListenerId,
}

impl ScopedSubscription<'_> {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ScopedSubscription<'_> {
    fn drop(&mut self) {
        self.dispatcher.remove(self.id);
    }
}
