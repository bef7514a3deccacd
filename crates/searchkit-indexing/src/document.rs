//! Index documents and their fields.
//!
//! Field values pass through two event stages:
//! - [`names::FIELD_ENRICH`] runs once, when the field is attached, and its
//!   result replaces the stored value.
//! - [`names::FIELD_NORMALIZE`] runs on every read and its result is
//!   returned without being stored.
//!
//! Both are dispatched through the run's [`FieldContext`], which logs around
//! each dispatch the same way [`CollectionAgent::dispatch`] does.
//!
//! [`CollectionAgent::dispatch`]: crate::CollectionAgent::dispatch

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use searchkit_types::{FieldType, FieldValue};
use serde_json::{json, Map, Value};

use crate::error::IndexingError;
use crate::events::{names, Event, EventDispatcher, FieldEvent};
use crate::logger::{log_context, Logger, TracingLogger};

/// A single named value of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexField {
    id: String,
    name: Option<String>,
    value: FieldValue,
}

impl IndexField {
    pub fn new(id: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            id: id.into(),
            name: None,
            value: value.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, defaulting to the id.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Stored (enriched, not normalized) value.
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<FieldValue>) {
        self.value = value.into();
    }
}

/// What a document needs from its pipeline run to dispatch field events.
#[derive(Clone)]
pub struct FieldContext {
    pub dispatcher: Arc<EventDispatcher>,
    /// Field id -> type, from the fused schema
    pub field_types: Arc<HashMap<String, FieldType>>,
    pub logger: Arc<dyn Logger>,
}

impl Default for FieldContext {
    fn default() -> Self {
        Self::new(Arc::default(), Arc::default())
    }
}

impl fmt::Debug for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldContext")
            .field("dispatcher", &self.dispatcher)
            .field("field_types", &self.field_types)
            .finish_non_exhaustive()
    }
}

impl FieldContext {
    pub fn new(
        dispatcher: Arc<EventDispatcher>,
        field_types: Arc<HashMap<String, FieldType>>,
    ) -> Self {
        Self {
            dispatcher,
            field_types,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn field_type(&self, field_id: &str) -> Option<&FieldType> {
        self.field_types.get(field_id)
    }

    fn dispatch(
        &self,
        name: &str,
        field_id: &str,
        event: &mut Event<'_>,
    ) -> Result<(), IndexingError> {
        let context = log_context([("event", json!(name)), ("field", json!(field_id))]);
        self.logger.debug("Dispatching event", &context);
        self.dispatcher.dispatch(name, event)?;
        self.logger.debug("Event dispatched", &context);
        Ok(())
    }
}

/// Ordered, id-keyed set of fields built for one queued item.
#[derive(Debug, Default)]
pub struct IndexDocument {
    fields: Vec<IndexField>,
    positions: HashMap<String, usize>,
    context: FieldContext,
}

impl IndexDocument {
    pub fn new(context: FieldContext) -> Self {
        Self {
            fields: Vec::new(),
            positions: HashMap::new(),
            context,
        }
    }

    /// A document with its own empty dispatcher and no field types.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &FieldContext {
        &self.context
    }

    fn field_event(&self, field: &IndexField) -> Event<'static> {
        Event::Field(FieldEvent {
            field_id: field.id.clone(),
            field_name: field.name().to_string(),
            field_type: self.context.field_type(&field.id).cloned(),
            value: field.value.clone(),
        })
    }

    fn settle(event: Event<'_>) -> FieldValue {
        match event {
            Event::Field(field) => field.value,
            _ => FieldValue::empty(),
        }
    }

    /// Enrich `field` and store it, replacing any field with the same id.
    pub fn attach_field(&mut self, mut field: IndexField) -> Result<(), IndexingError> {
        let mut event = self.field_event(&field);
        self.context
            .dispatch(names::FIELD_ENRICH, &field.id, &mut event)?;
        field.value = Self::settle(event);

        match self.positions.get(&field.id) {
            Some(&position) => self.fields[position] = field,
            None => {
                self.positions.insert(field.id.clone(), self.fields.len());
                self.fields.push(field);
            }
        }
        Ok(())
    }

    /// Attach a field with an implicit display name.
    pub fn set(
        &mut self,
        field_id: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), IndexingError> {
        self.attach_field(IndexField::new(field_id, value))
    }

    pub fn has(&self, field_id: &str) -> bool {
        self.positions.contains_key(field_id)
    }

    pub fn field(&self, field_id: &str) -> Option<&IndexField> {
        self.positions.get(field_id).map(|&p| &self.fields[p])
    }

    /// Like [`IndexDocument::field`], but a missing field is an error.
    pub fn get_field(&self, field_id: &str) -> Result<&IndexField, IndexingError> {
        self.field(field_id)
            .ok_or_else(|| IndexingError::FieldNotFound(field_id.to_string()))
    }

    /// Normalized value of `field`. Dispatches on every call.
    pub fn normalize(&self, field: &IndexField) -> Result<FieldValue, IndexingError> {
        let mut event = self.field_event(field);
        self.context
            .dispatch(names::FIELD_NORMALIZE, &field.id, &mut event)?;
        Ok(Self::settle(event))
    }

    /// Normalized value of the field with this id, if attached.
    pub fn get(&self, field_id: &str) -> Result<Option<FieldValue>, IndexingError> {
        self.field(field_id).map(|f| self.normalize(f)).transpose()
    }

    pub fn remove(&mut self, field_id: &str) -> Option<IndexField> {
        let position = self.positions.remove(field_id)?;
        let field = self.fields.remove(position);
        for (index, field) in self.fields.iter().enumerate().skip(position) {
            self.positions.insert(field.id.clone(), index);
        }
        Some(field)
    }

    /// Fields in attachment order, with stored values.
    pub fn fields(&self) -> impl Iterator<Item = &IndexField> {
        self.fields.iter()
    }

    pub fn field_ids(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.id.as_str()).collect()
    }

    /// Fields in attachment order, each with its normalized value.
    pub fn iter(&self) -> DocumentIter<'_> {
        DocumentIter {
            document: self,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Normalized values as a JSON object keyed by display name.
    pub fn to_json(&self) -> Result<Value, IndexingError> {
        let mut map = Map::new();
        for entry in self.iter() {
            let (field, value) = entry?;
            map.insert(field.name().to_string(), serde_json::to_value(value)?);
        }
        Ok(Value::Object(map))
    }
}

/// Iterator over a document's fields and their normalized values.
pub struct DocumentIter<'a> {
    document: &'a IndexDocument,
    position: usize,
}

impl<'a> Iterator for DocumentIter<'a> {
    type Item = Result<(&'a IndexField, FieldValue), IndexingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let field = self.document.fields.get(self.position)?;
        self.position += 1;
        Some(self.document.normalize(field).map(|value| (field, value)))
    }
}

impl<'a> IntoIterator for &'a IndexDocument {
    type Item = Result<(&'a IndexField, FieldValue), IndexingError>;
    type IntoIter = DocumentIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
