//! Field values carried by index documents.
//!
//! A value is either a single string or an ordered list of strings
//! (multivalued fields).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Content of a single document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A single string value
    Single(String),
    /// An ordered sequence of values
    Multi(Vec<String>),
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Single(String::new())
    }
}

impl FieldValue {
    /// The empty single value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True for an empty string or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Single(s) => s.is_empty(),
            FieldValue::Multi(values) => values.is_empty(),
        }
    }

    /// Whether this value holds a list.
    pub fn is_multi(&self) -> bool {
        matches!(self, FieldValue::Multi(_))
    }

    /// Borrow the single value, if this is not a list.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Single(s) => Some(s.as_str()),
            FieldValue::Multi(_) => None,
        }
    }

    /// Iterate over every string in the value.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            FieldValue::Single(s) => std::slice::from_ref(s),
            FieldValue::Multi(values) => values.as_slice(),
        };
        slice.iter().map(String::as_str)
    }

    /// Apply `f` to every element, keeping the shape.
    pub fn map<F>(&self, mut f: F) -> FieldValue
    where
        F: FnMut(&str) -> String,
    {
        match self {
            FieldValue::Single(s) => FieldValue::Single(f(s.as_str())),
            FieldValue::Multi(values) => {
                FieldValue::Multi(values.iter().map(|v| f(v.as_str())).collect())
            }
        }
    }

    /// Join all elements with `separator`.
    pub fn join(&self, separator: &str) -> String {
        self.iter().collect::<Vec<_>>().join(separator)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Single(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Single(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::Multi(values)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(values: Vec<&str>) -> Self {
        FieldValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.join(", "))
    }
}
