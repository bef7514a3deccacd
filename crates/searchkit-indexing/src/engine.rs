//! Search engine contract.
//!
//! The pipeline never talks to a search backend directly. A
//! [`SearchEngine`] converts finished documents into the backend's native
//! indexing call and supplies normalizers per field type.

use std::sync::Arc;

use searchkit_types::{FieldType, FieldValue, Schema};
use serde_json::Value;
use tracing::trace;

use crate::collection::Collection;
use crate::document::{FieldContext, IndexDocument, IndexField};
use crate::error::IndexingError;
use crate::events::{names, Event, EventSubscriber};
use crate::normalizer::Normalizer;

/// Trait for search backend adapters.
pub trait SearchEngine: Send + Sync {
    /// Name of this engine for logging.
    fn name(&self) -> &str;

    /// Create an empty document bound to a pipeline's event context.
    fn new_document(&self, context: FieldContext) -> IndexDocument {
        IndexDocument::new(context)
    }

    fn new_field(&self, id: &str, value: FieldValue, name: Option<&str>) -> IndexField {
        let field = IndexField::new(id, value);
        match name {
            Some(name) => field.with_name(name),
            None => field,
        }
    }

    fn has_normalizer(&self, field_type: &FieldType) -> bool {
        self.normalizer(field_type).is_some()
    }

    fn normalizer(&self, _field_type: &FieldType) -> Option<Arc<dyn Normalizer>> {
        None
    }

    /// Like [`SearchEngine::normalizer`], but missing normalizers are an error.
    fn get_normalizer(&self, field_type: &FieldType) -> Result<Arc<dyn Normalizer>, IndexingError> {
        self.normalizer(field_type)
            .ok_or_else(|| IndexingError::NormalizerNotFound(field_type.to_string()))
    }

    /// Extra events the engine wants while the indexer drains the queue.
    fn subscribed_events(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn on_event(&self, _name: &str, _event: &mut Event<'_>) -> Result<(), IndexingError> {
        Ok(())
    }

    /// Create (or recreate) the backend index for `schema`.
    fn create_index(&self, schema: &Schema, options: &Value) -> Result<(), IndexingError>;

    /// Send one finished document to the backend.
    fn index_document(
        &self,
        collection: &dyn Collection,
        document: &IndexDocument,
    ) -> Result<(), IndexingError>;

    /// Run a query; the result is backend-native.
    fn search(&self, keywords: &str, options: &Value) -> Result<Value, IndexingError>;

    /// Delete the backend index.
    fn delete(&self) -> Result<(), IndexingError>;
}

/// Adapts a [`SearchEngine`] to the event dispatcher.
///
/// Handles [`names::FIELD_NORMALIZE`] by applying the engine's normalizer
/// for the field's type, then forwards any event the engine subscribed to.
pub struct EngineSubscriber {
    engine: Arc<dyn SearchEngine>,
    engine_events: Vec<&'static str>,
}

impl EngineSubscriber {
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        let engine_events = engine.subscribed_events();
        Self {
            engine,
            engine_events,
        }
    }

    fn normalize(&self, event: &mut Event<'_>) {
        let Some(field) = event.as_field_mut() else {
            return;
        };
        let Some(field_type) = field.field_type.as_ref() else {
            return;
        };
        if let Some(normalizer) = self.engine.normalizer(field_type) {
            trace!(field = %field.field_id, field_type = %field_type, "Normalizing field");
            field.value = normalizer.normalize_value(&field.value);
        }
    }
}

impl EventSubscriber for EngineSubscriber {
    fn subscribed_events(&self) -> Vec<&'static str> {
        let mut events = vec![names::FIELD_NORMALIZE];
        for event in &self.engine_events {
            if !events.contains(event) {
                events.push(*event);
            }
        }
        events
    }

    fn on_event(&self, name: &str, event: &mut Event<'_>) -> Result<(), IndexingError> {
        if name == names::FIELD_NORMALIZE {
            self.normalize(event);
        }
        if self.engine_events.iter().any(|event_name| *event_name == name) {
            self.engine.on_event(name, event)?;
        }
        Ok(())
    }
}
