//! # searchkit-types
//!
//! Shared domain types for the searchkit indexing pipeline.
//!
//! This crate defines the data structures every other crate speaks:
//! - [`Schema`] / [`SchemaField`]: field definitions and the unique field
//! - [`FieldValue`]: single or multivalued field content
//! - [`QueueMessage`]: the envelope moved through a queue backend
//! - [`WorkerBounds`]: limit and timeout thresholds for bounded workers
//! - [`Settings`]: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use searchkit_types::{FieldType, Schema, SchemaField};
//!
//! let mut schema = Schema::new().with_unique_field("path");
//! schema.add_field(SchemaField::new("path", FieldType::String)).unwrap();
//! assert_eq!(schema.unique_field(), Some("path"));
//! ```

pub mod bounds;
pub mod config;
pub mod error;
pub mod message;
pub mod schema;
pub mod value;

pub use bounds::{Deadline, Limit, Timeout, WorkerBounds};
pub use config::{AgentSettings, CollectionKind, CollectionSettings, Settings};
pub use error::TypesError;
pub use message::QueueMessage;
pub use schema::{FieldType, Schema, SchemaField};
pub use value::FieldValue;
