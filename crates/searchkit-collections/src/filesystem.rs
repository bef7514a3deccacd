//! Collection over the files below a root directory.
//!
//! Items are paths relative to the root (always `/`-separated), selected by
//! include globs and filtered by exclude globs. Source data is loaded from
//! disk when the message is consumed, so a file deleted in between is
//! reported as unavailable. Bodies that escape the root, or that the globs
//! would never have scheduled, are unavailable too, and so is a file that
//! cannot be read.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use searchkit_indexing::{
    Collection, IndexDocument, IndexingError, ScheduledItem, ScheduledItems, SourceData,
};
use searchkit_types::{CollectionSettings, FieldType, Limit, QueueMessage, Schema, SchemaField};
use serde_json::{json, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::field_value;

/// Unique field unless configured otherwise.
pub const DEFAULT_UNIQUE_FIELD: &str = "path";

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Indexes the files below `root`.
#[derive(Debug, Clone)]
pub struct FilesystemCollection {
    id: String,
    root: PathBuf,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    include: GlobSet,
    exclude: GlobSet,
    unique_field: String,
}

impl FilesystemCollection {
    /// Collection over every file below `root`.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Result<Self, IndexingError> {
        let include_patterns = vec!["**/*".to_string()];
        let exclude_patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        Ok(Self {
            id: id.into(),
            root: root.into(),
            include: build_globset(&include_patterns)?,
            exclude: build_globset(&exclude_patterns)?,
            include_patterns,
            exclude_patterns,
            unique_field: DEFAULT_UNIQUE_FIELD.to_string(),
        })
    }

    /// Build from a configured collection entry.
    pub fn from_settings(settings: &CollectionSettings) -> Result<Self, IndexingError> {
        let root = settings.path.as_ref().ok_or_else(|| {
            IndexingError::collection(format!("collection '{}' has no path", settings.id))
        })?;
        let mut collection = Self::new(settings.id.clone(), root.clone())?
            .with_include(settings.include.clone())?;
        if let Some(unique_field) = &settings.unique_field {
            collection = collection.with_unique_field(unique_field)?;
        }
        Ok(collection)
    }

    pub fn with_include(mut self, patterns: Vec<String>) -> Result<Self, IndexingError> {
        self.include = build_globset(&patterns)?;
        self.include_patterns = patterns;
        Ok(self)
    }

    /// Extra exclude patterns, on top of VCS and build directories.
    pub fn with_exclude(mut self, patterns: Vec<String>) -> Result<Self, IndexingError> {
        let mut all: Vec<String> = DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        all.extend(patterns);
        self.exclude = build_globset(&all)?;
        self.exclude_patterns = all;
        Ok(self)
    }

    pub fn with_unique_field(mut self, field_id: &str) -> Result<Self, IndexingError> {
        if !base_schema()?.contains(field_id) {
            return Err(IndexingError::FieldNotFound(field_id.to_string()));
        }
        self.unique_field = field_id.to_string();
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    fn is_selected(&self, relative: &str) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// `None` when `relative` does not name a selected file below the root.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let candidate = Path::new(relative);
        let plain = candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if relative.is_empty() || !plain || !self.is_selected(relative) {
            return None;
        }
        Some(self.root.join(candidate))
    }

    fn read_file(&self, relative: &str) -> Result<Option<SourceData>, IndexingError> {
        let Some(path) = self.resolve(relative) else {
            warn!(collection = %self.id, path = relative, "Rejected path outside the collection");
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }

        let (metadata, bytes) = match fs::metadata(&path).and_then(|m| Ok((m, fs::read(&path)?))) {
            Ok(read) => read,
            Err(e) => {
                warn!(collection = %self.id, path = %path.display(), error = %e, "Failed to read file");
                return Ok(None);
            }
        };
        let modified: DateTime<Utc> = metadata
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH)
            .into();

        Ok(Some(json!({
            "path": relative,
            "filename": path.file_name().map(|n| n.to_string_lossy().into_owned()),
            "extension": path.extension().map(|e| e.to_string_lossy().into_owned()),
            "content": String::from_utf8_lossy(&bytes),
            "size": metadata.len(),
            "modified": modified.to_rfc3339(),
        })))
    }
}

fn base_schema() -> Result<Schema, IndexingError> {
    let fields = [
        SchemaField::new("path", FieldType::String).with_label("Path"),
        SchemaField::new("filename", FieldType::String).with_label("File name"),
        SchemaField::new("extension", FieldType::String).with_label("Extension"),
        SchemaField::new("content", FieldType::Fulltext)
            .with_label("Content")
            .stored(false),
        SchemaField::new("size", FieldType::Integer).with_label("Size in bytes"),
        SchemaField::new("modified", FieldType::Date).with_label("Last modified"),
    ];
    let mut schema = Schema::new().with_name("filesystem");
    for field in fields {
        schema.add_field(field)?;
    }
    Ok(schema)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IndexingError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| IndexingError::collection(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| IndexingError::collection(e.to_string()))
}

impl Collection for FilesystemCollection {
    fn id(&self) -> &str {
        &self.id
    }

    /// Accepts `{"include": [...], "exclude": [...]}`.
    fn init(&mut self, options: &Value) -> Result<(), IndexingError> {
        let patterns = |key: &str| -> Option<Vec<String>> {
            options.get(key)?.as_array().map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
        };
        if let Some(include) = patterns("include") {
            *self = self.clone().with_include(include)?;
        }
        if let Some(exclude) = patterns("exclude") {
            *self = self.clone().with_exclude(exclude)?;
        }
        Ok(())
    }

    fn schema(&self) -> Result<Schema, IndexingError> {
        let mut schema = base_schema()?;
        schema.set_unique_field(Some(self.unique_field.clone()));
        Ok(schema)
    }

    fn fetch_scheduled_items(&self, _limit: Limit) -> Result<ScheduledItems<'_>, IndexingError> {
        if !self.root.is_dir() {
            return Err(IndexingError::collection(format!(
                "collection root does not exist: {}",
                self.root.display()
            )));
        }
        debug!(collection = %self.id, root = %self.root.display(), "Scanning directory");

        let items = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| self.relative_path(entry.path()))
            .filter(move |relative| self.is_selected(relative))
            .map(ScheduledItem::String);
        Ok(Box::new(items))
    }

    fn build_queue_message(
        &self,
        message: &mut QueueMessage,
        item: &ScheduledItem,
    ) -> Result<(), IndexingError> {
        let relative = item
            .as_str()
            .ok_or_else(|| IndexingError::collection(format!("not a path: {item}")))?;
        message.set_body(relative);
        Ok(())
    }

    fn load_source_data(&self, message: &QueueMessage) -> Result<Option<SourceData>, IndexingError> {
        self.read_file(message.body())
    }

    fn build_document(
        &self,
        document: &mut IndexDocument,
        data: &SourceData,
    ) -> Result<(), IndexingError> {
        for field in base_schema()?.fields() {
            if let Some(value) = data.get(field.id()).and_then(field_value) {
                document.set(field.id(), value)?;
            }
        }
        Ok(())
    }
}
