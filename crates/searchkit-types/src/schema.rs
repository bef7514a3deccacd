//! Schema model: field definitions, the unique field, and name lookup.
//!
//! A [`Schema`] is an ordered mapping from field id to [`SchemaField`].
//! Every field also has a display name (defaulting to its id); the schema
//! keeps a secondary name → id index that is updated together with the
//! primary mapping on every mutation.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Data type of a schema field.
///
/// The set is open: backends may define their own types through
/// [`FieldType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Tokenized, analyzed text
    Fulltext,
    /// Exact-match string
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Binary,
    /// Stored but never indexed
    Unindexed,
    Date,
    /// Backend-specific type
    Custom(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Fulltext => "fulltext",
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Binary => "binary",
            FieldType::Unindexed => "unindexed",
            FieldType::Date => "date",
            FieldType::Custom(name) => name.as_str(),
        }
    }

    /// Parse a type name; unknown names become [`FieldType::Custom`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "fulltext" | "text" => FieldType::Fulltext,
            "string" => FieldType::String,
            "integer" | "int" => FieldType::Integer,
            "float" => FieldType::Float,
            "boolean" | "bool" => FieldType::Boolean,
            "binary" => FieldType::Binary,
            "unindexed" => FieldType::Unindexed,
            "date" => FieldType::Date,
            other => FieldType::Custom(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::parse(&s)
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Definition of a single field.
///
/// The id is fixed once the field is attached to a schema; use
/// [`Schema::rename_field`] to re-key it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    /// Optional size qualifier (e.g. max length)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    #[serde(default = "default_true")]
    pub indexed: bool,

    #[serde(default = "default_true")]
    pub stored: bool,

    #[serde(default)]
    pub multivalued: bool,

    #[serde(default)]
    pub analyzed: bool,
}

impl SchemaField {
    /// Create a field. Fulltext fields are analyzed by default.
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        let analyzed = field_type == FieldType::Fulltext;
        let indexed = field_type != FieldType::Unindexed;
        Self {
            id: id.into(),
            name: None,
            label: None,
            description: None,
            field_type,
            size: None,
            indexed,
            stored: true,
            multivalued: false,
            analyzed,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    pub fn multivalued(mut self, multivalued: bool) -> Self {
        self.multivalued = multivalued;
        self
    }

    pub fn analyzed(mut self, analyzed: bool) -> Self {
        self.analyzed = analyzed;
        self
    }

    /// Serialized form used for structural comparison.
    ///
    /// The display name is always resolved, so a field with an implicit
    /// name equals one whose name was set to its id.
    pub fn definition(&self) -> Result<serde_json::Value, TypesError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "name".to_string(),
                serde_json::Value::String(self.name().to_string()),
            );
        }
        Ok(value)
    }

    /// Whether two definitions are structurally identical.
    pub fn same_definition(&self, other: &SchemaField) -> Result<bool, TypesError> {
        Ok(self.definition()? == other.definition()?)
    }
}

/// Serialized shape of a schema definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchemaDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unique_field: Option<String>,
    #[serde(default)]
    fields: Vec<SchemaField>,
}

/// An ordered collection of field definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "SchemaDefinition", into = "SchemaDefinition")]
pub struct Schema {
    name: Option<String>,
    unique_field: Option<String>,
    fields: Vec<SchemaField>,
    /// field id -> position in `fields`
    ids: HashMap<String, usize>,
    /// display name -> field id
    names: HashMap<String, String>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.unique_field == other.unique_field
            && self.fields == other.fields
    }
}

impl TryFrom<SchemaDefinition> for Schema {
    type Error = TypesError;

    fn try_from(definition: SchemaDefinition) -> Result<Self, Self::Error> {
        let mut schema = Schema {
            name: definition.name,
            unique_field: definition.unique_field,
            ..Default::default()
        };
        for field in definition.fields {
            schema.add_field(field)?;
        }
        if let Some(unique) = &schema.unique_field {
            if !schema.contains(unique) {
                return Err(TypesError::InvalidInput(format!(
                    "unique field '{}' is not defined",
                    unique
                )));
            }
        }
        Ok(schema)
    }
}

impl From<Schema> for SchemaDefinition {
    fn from(schema: Schema) -> Self {
        SchemaDefinition {
            name: schema.name,
            unique_field: schema.unique_field,
            fields: schema.fields,
        }
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unique_field(mut self, field_id: impl Into<String>) -> Self {
        self.unique_field = Some(field_id.into());
        self
    }

    /// Load a schema from its JSON definition.
    pub fn from_json(json: &str) -> Result<Self, TypesError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, TypesError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn unique_field(&self) -> Option<&str> {
        self.unique_field.as_deref()
    }

    pub fn set_unique_field(&mut self, field_id: Option<String>) {
        self.unique_field = field_id;
    }

    /// The definition of the unique field, if one is set and defined.
    pub fn unique_schema_field(&self) -> Option<&SchemaField> {
        self.unique_field.as_deref().and_then(|id| self.field(id))
    }

    /// Append a field. Fails if the id or display name is taken.
    pub fn add_field(&mut self, field: SchemaField) -> Result<(), TypesError> {
        if self.ids.contains_key(field.id()) {
            return Err(TypesError::DuplicateField(field.id().to_string()));
        }
        if self.names.contains_key(field.name()) {
            return Err(TypesError::DuplicateName(field.name().to_string()));
        }
        self.ids.insert(field.id().to_string(), self.fields.len());
        self.names
            .insert(field.name().to_string(), field.id().to_string());
        self.fields.push(field);
        Ok(())
    }

    /// Remove a field by id, returning its definition.
    pub fn remove_field(&mut self, field_id: &str) -> Option<SchemaField> {
        let position = self.ids.get(field_id).copied()?;
        let field = self.fields.remove(position);
        if self.unique_field.as_deref() == Some(field_id) {
            self.unique_field = None;
        }
        self.rebuild_index();
        Some(field)
    }

    /// Change a field's id, keeping its position and display name.
    ///
    /// An implicit display name (equal to the old id) follows the id.
    pub fn rename_field(&mut self, old_id: &str, new_id: &str) -> Result<(), TypesError> {
        let position = *self
            .ids
            .get(old_id)
            .ok_or_else(|| TypesError::FieldNotFound(old_id.to_string()))?;
        if old_id == new_id {
            return Ok(());
        }
        if self.ids.contains_key(new_id) {
            return Err(TypesError::DuplicateField(new_id.to_string()));
        }
        let implicit_name = self.fields[position].name.is_none();
        if implicit_name && self.names.contains_key(new_id) {
            return Err(TypesError::DuplicateName(new_id.to_string()));
        }

        self.fields[position].id = new_id.to_string();
        if self.unique_field.as_deref() == Some(old_id) {
            self.unique_field = Some(new_id.to_string());
        }
        self.rebuild_index();
        Ok(())
    }

    /// Change a field's display name.
    pub fn set_field_name(&mut self, field_id: &str, name: &str) -> Result<(), TypesError> {
        let position = *self
            .ids
            .get(field_id)
            .ok_or_else(|| TypesError::FieldNotFound(field_id.to_string()))?;
        if let Some(owner) = self.names.get(name) {
            if owner != field_id {
                return Err(TypesError::DuplicateName(name.to_string()));
            }
        }
        self.fields[position].name = Some(name.to_string());
        self.rebuild_index();
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.ids.clear();
        self.names.clear();
        for (position, field) in self.fields.iter().enumerate() {
            self.ids.insert(field.id().to_string(), position);
            self.names
                .insert(field.name().to_string(), field.id().to_string());
        }
    }

    pub fn field(&self, field_id: &str) -> Option<&SchemaField> {
        self.ids.get(field_id).map(|&position| &self.fields[position])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&SchemaField> {
        self.names.get(name).and_then(|id| self.field(id))
    }

    /// Resolve a display name to a field id.
    pub fn field_id(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }

    pub fn contains(&self, field_id: &str) -> bool {
        self.ids.contains_key(field_id)
    }

    /// Fields in definition order.
    pub fn fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.iter()
    }

    pub fn field_ids(&self) -> Vec<&str> {
        self.fields.iter().map(SchemaField::id).collect()
    }

    /// Field id -> data type, used for normalizer lookup.
    pub fn field_types(&self) -> HashMap<String, FieldType> {
        self.fields
            .iter()
            .map(|f| (f.id().to_string(), f.field_type.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
