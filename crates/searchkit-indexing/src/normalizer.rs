//! Field value normalizers keyed by field type.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use searchkit_types::{FieldType, FieldValue};

/// Pure value-to-value mapping applied when a field is read.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, value: &str) -> String;

    /// Normalize every element of a (possibly multivalued) field value.
    fn normalize_value(&self, value: &FieldValue) -> FieldValue {
        value.map(|v| self.normalize(v))
    }
}

/// Output format of [`DateNormalizer`].
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Converts dates to UTC `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` and unix
/// seconds. Anything else is passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer;

impl DateNormalizer {
    fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
            return Some(dt.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
        value
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl Normalizer for DateNormalizer {
    fn normalize(&self, value: &str) -> String {
        let trimmed = value.trim();
        match Self::parse(trimmed) {
            Some(dt) => dt.format(DATE_FORMAT).to_string(),
            None => value.to_string(),
        }
    }
}

/// Maps `1`, `yes`, `on` and `true` (any case) to `true`, everything else
/// to `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanNormalizer;

impl Normalizer for BooleanNormalizer {
    fn normalize(&self, value: &str) -> String {
        let truthy = matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "yes" | "on" | "true"
        );
        truthy.to_string()
    }
}

/// Trims and parses as an integer; non-numeric input becomes `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerNormalizer;

impl Normalizer for IntegerNormalizer {
    fn normalize(&self, value: &str) -> String {
        let trimmed = value.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return n.to_string();
        }
        // "12.7" -> 12
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| (f.trunc() as i64).to_string())
            .unwrap_or_else(|| "0".to_string())
    }
}

/// Strips leading and trailing whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimNormalizer;

impl Normalizer for TrimNormalizer {
    fn normalize(&self, value: &str) -> String {
        value.trim().to_string()
    }
}

/// Normalizers registered per field type.
#[derive(Clone, Default)]
pub struct NormalizerSet {
    normalizers: HashMap<FieldType, Arc<dyn Normalizer>>,
}

impl std::fmt::Debug for NormalizerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.normalizers.keys().map(FieldType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("NormalizerSet").field("types", &types).finish()
    }
}

impl NormalizerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Date, boolean and integer normalizers, plus trimming for strings.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(FieldType::Date, DateNormalizer)
            .with(FieldType::Boolean, BooleanNormalizer)
            .with(FieldType::Integer, IntegerNormalizer)
            .with(FieldType::String, TrimNormalizer)
    }

    pub fn with(mut self, field_type: FieldType, normalizer: impl Normalizer + 'static) -> Self {
        self.insert(field_type, Arc::new(normalizer));
        self
    }

    pub fn insert(&mut self, field_type: FieldType, normalizer: Arc<dyn Normalizer>) {
        self.normalizers.insert(field_type, normalizer);
    }

    pub fn contains(&self, field_type: &FieldType) -> bool {
        self.normalizers.contains_key(field_type)
    }

    pub fn get(&self, field_type: &FieldType) -> Option<Arc<dyn Normalizer>> {
        self.normalizers.get(field_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.normalizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalizers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_formats() {
        let n = DateNormalizer;
        assert_eq!(n.normalize("2024-03-01T10:20:30+02:00"), "2024-03-01T08:20:30Z");
        assert_eq!(n.normalize("2024-03-01 10:20:30"), "2024-03-01T10:20:30Z");
        assert_eq!(n.normalize("2024-03-01"), "2024-03-01T00:00:00Z");
        assert_eq!(n.normalize("0"), "1970-01-01T00:00:00Z");
        assert_eq!(n.normalize(" 86400 "), "1970-01-02T00:00:00Z");
    }

    #[test]
    fn test_date_unparseable_passthrough() {
        assert_eq!(DateNormalizer.normalize("last tuesday"), "last tuesday");
    }

    #[test]
    fn test_boolean() {
        let n = BooleanNormalizer;
        for truthy in ["1", "yes", "ON", " true "] {
            assert_eq!(n.normalize(truthy), "true");
        }
        for falsy in ["0", "no", "", "maybe"] {
            assert_eq!(n.normalize(falsy), "false");
        }
    }

    #[test]
    fn test_integer() {
        let n = IntegerNormalizer;
        assert_eq!(n.normalize(" 42 "), "42");
        assert_eq!(n.normalize("-7"), "-7");
        assert_eq!(n.normalize("12.7"), "12");
        assert_eq!(n.normalize("abc"), "0");
    }

    #[test]
    fn test_normalize_multivalue_keeps_shape() {
        let value = FieldValue::from(vec![" a ", "b "]);
        let normalized = TrimNormalizer.normalize_value(&value);
        assert_eq!(normalized, FieldValue::from(vec!["a", "b"]));
    }

    #[test]
    fn test_normalizer_set_defaults() {
        let set = NormalizerSet::with_defaults();
        assert_eq!(set.len(), 4);
        assert!(set.contains(&FieldType::Date));
        assert!(!set.contains(&FieldType::Fulltext));

        let boolean = set.get(&FieldType::Boolean).unwrap();
        assert_eq!(boolean.normalize("yes"), "true");
        assert!(set.get(&FieldType::Custom("geo".into())).is_none());
    }
}
