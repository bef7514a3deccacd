//! Search engine that writes documents as JSON lines.
//!
//! Each indexed document becomes one line:
//! `{"collection": "<id>", "document": {<field name>: <normalized value>}}`.
//! `create_index` writes the schema line first when asked to.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use searchkit_indexing::{
    Collection, IndexDocument, IndexingError, Normalizer, NormalizerSet, SearchEngine,
};
use searchkit_types::{FieldType, Schema};
use serde_json::{json, Value};

pub struct JsonLinesEngine {
    writer: Mutex<Box<dyn Write + Send>>,
    normalizers: NormalizerSet,
    written: AtomicUsize,
}

impl JsonLinesEngine {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            normalizers: NormalizerSet::with_defaults(),
            written: AtomicUsize::new(0),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn with_normalizers(mut self, normalizers: NormalizerSet) -> Self {
        self.normalizers = normalizers;
        self
    }

    /// Documents written so far.
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    fn write_line(&self, line: &Value) -> Result<(), IndexingError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, line)?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| IndexingError::engine(format!("write failed: {e}")))
    }
}

impl SearchEngine for JsonLinesEngine {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn normalizer(&self, field_type: &FieldType) -> Option<Arc<dyn Normalizer>> {
        self.normalizers.get(field_type)
    }

    /// Accepts `{"emit_schema": true}`.
    fn create_index(&self, schema: &Schema, options: &Value) -> Result<(), IndexingError> {
        if options.get("emit_schema").and_then(Value::as_bool) == Some(true) {
            self.write_line(&json!({ "schema": serde_json::to_value(schema)? }))?;
        }
        Ok(())
    }

    fn index_document(
        &self,
        collection: &dyn Collection,
        document: &IndexDocument,
    ) -> Result<(), IndexingError> {
        self.write_line(&json!({
            "collection": collection.id(),
            "document": document.to_json()?,
        }))?;
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn search(&self, _keywords: &str, _options: &Value) -> Result<Value, IndexingError> {
        Err(IndexingError::engine("jsonl engine does not support search"))
    }

    fn delete(&self) -> Result<(), IndexingError> {
        Ok(())
    }
}
