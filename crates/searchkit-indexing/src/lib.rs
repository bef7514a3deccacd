//! Queue-mediated indexing pipeline for searchkit.
//!
//! This crate moves items from data sources ("collections") through a
//! queue backend into a search engine, one document per item.
//!
//! ## Key Components
//!
//! - [`Collection`]: Trait for data sources feeding the pipeline
//! - [`SearchEngine`]: Trait for search backend adapters
//! - [`Producer`] / [`Consumer`]: Bounded, restartable message sequences
//! - [`CollectionAgent`]: Collections, queue, fused schema and run settings
//! - [`Collector`]: Publishes scheduled items to the queue
//! - [`Indexer`]: Drains the queue into the search engine
//! - [`IndexDocument`]: Per-item field container with enrich/normalize stages
//! - [`EventDispatcher`]: Synchronous events shared by one pipeline run
//! - [`Logger`]: Leveled logging collaborator, `tracing`-backed by default
//!
//! ## Architecture
//!
//! Indexing is always a full cycle:
//! 1. The [`Collector`] runs a [`Producer`] per collection and publishes
//!    every message it yields
//! 2. The [`Indexer`] fuses the collection schemas, failing on conflicts
//! 3. A [`Consumer`] drains the queue; each message is loaded back through
//!    its collection and built into an [`IndexDocument`]
//! 4. The document goes to the [`SearchEngine`]
//! 5. The queue is acknowledged; on failure the messages stay claimed
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use searchkit_indexing::{CollectionAgent, Indexer};
//! use searchkit_queue::MemoryQueue;
//!
//! let mut agent = CollectionAgent::new(Arc::new(MemoryQueue::new()));
//! agent.attach_collection(Arc::new(my_collection))?;
//!
//! let mut indexer = Indexer::new(agent, Arc::new(my_engine));
//! let result = indexer.index()?;
//! println!("indexed {} of {}", result.indexed, result.consumed);
//! ```

pub mod agent;
pub mod collection;
pub mod collector;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod indexer;
pub mod logger;
pub mod normalizer;
pub mod worker;

#[cfg(test)]
mod testing;

pub use agent::{fuse_schemas, merge_schema, CollectionAgent};
pub use collection::{is_falsy, Collection, ScheduledItem, ScheduledItems, SourceData};
pub use collector::{Collector, QueueResult};
pub use document::{DocumentIter, FieldContext, IndexDocument, IndexField};
pub use engine::{EngineSubscriber, SearchEngine};
pub use error::IndexingError;
pub use events::{
    names, DocumentEvent, Event, EventDispatcher, EventSubscriber, FieldEvent, IndexEvent,
    Listener, ListenerId, QueueEvent, ScopedSubscription,
};
pub use indexer::{IndexResult, Indexer};
pub use logger::{
    log_context, LogContext, LogLevel, LogRecord, Logger, MemoryLogger, NoopLogger, TracingLogger,
};
pub use normalizer::{
    BooleanNormalizer, DateNormalizer, IntegerNormalizer, Normalizer, NormalizerSet,
    TrimNormalizer, DATE_FORMAT,
};
pub use worker::{Consumer, Producer};
