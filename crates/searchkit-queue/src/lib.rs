//! # searchkit-queue
//!
//! Queue backends that carry [`QueueMessage`]s from the collector to the
//! indexer.
//!
//! ## Key Components
//!
//! - [`QueueBackend`]: publish / consume / acknowledge contract
//! - [`MemoryQueue`]: in-process reference backend
//! - [`QueueError`]: error type for backend operations
//!
//! ## Delivery
//!
//! Delivery is at-least-once. `consume` claims a message and records it in
//! the backend's consumed log; `acknowledge(true)` removes everything in
//! the log, `acknowledge(false)` leaves the messages claimed so they are
//! redelivered once the consuming connection goes away.
//!
//! [`QueueMessage`]: searchkit_types::QueueMessage

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::QueueBackend;
pub use error::QueueError;
pub use memory::MemoryQueue;
