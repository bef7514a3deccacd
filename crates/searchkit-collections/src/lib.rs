//! Concrete collections for the searchkit pipeline.
//!
//! - [`FilesystemCollection`]: files below a directory, selected by globs
//! - [`StaticCollection`]: JSON records held in memory
//!
//! [`from_settings`] builds the collection a configuration entry describes.

pub mod filesystem;
pub mod memory;

use std::sync::Arc;

use searchkit_indexing::{Collection, IndexingError};
use searchkit_types::{CollectionKind, CollectionSettings, FieldValue};
use serde_json::Value;

pub use filesystem::FilesystemCollection;
pub use memory::StaticCollection;

/// Build the collection described by a settings entry.
pub fn from_settings(settings: &CollectionSettings) -> Result<Arc<dyn Collection>, IndexingError> {
    match settings.kind {
        CollectionKind::Filesystem => Ok(Arc::new(FilesystemCollection::from_settings(settings)?)),
    }
}

/// Convert a JSON value from source data into a field value.
///
/// Scalars become single values; arrays of scalars become multivalues.
/// Null, objects and empty arrays yield `None`.
pub(crate) fn field_value(value: &Value) -> Option<FieldValue> {
    fn scalar(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    match value {
        Value::Array(items) => {
            let values: Vec<String> = items.iter().filter_map(scalar).collect();
            (!values.is_empty()).then(|| FieldValue::from(values))
        }
        other => scalar(other).map(FieldValue::from),
    }
}
