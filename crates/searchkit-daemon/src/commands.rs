//! Command implementations for the searchkit runner.
//!
//! Handles:
//! - index: Queue every collection, then drain the queue into the JSON-lines engine
//! - queue: Queue every collection and report the counts
//! - schema: Print the fused schema

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use searchkit_indexing::{
    CollectionAgent, Collector, IndexResult, Indexer, QueueResult, SearchEngine,
};
use searchkit_queue::MemoryQueue;
use searchkit_types::Settings;
use serde_json::{json, Value};
use tracing::info;

use crate::engine::JsonLinesEngine;

/// CLI flags applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub limit: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Load configuration (defaults -> file -> env) and apply CLI overrides.
pub fn load_settings(config_path: Option<&str>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(log_level) = &overrides.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(limit) = overrides.limit {
        settings.agent.limit = Some(limit);
    }
    if let Some(timeout) = overrides.timeout_secs {
        settings.agent.timeout_secs = Some(timeout);
    }

    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Build an agent over an in-memory queue with the configured collections.
///
/// When `only` is non-empty, just those collections are attached.
pub fn build_agent(settings: &Settings, only: &[String]) -> Result<CollectionAgent> {
    if let Some(unknown) = only
        .iter()
        .find(|id| !settings.collections.iter().any(|c| &c.id == *id))
    {
        anyhow::bail!("Collection '{}' is not configured", unknown);
    }

    let mut agent =
        CollectionAgent::new(Arc::new(MemoryQueue::new())).with_bounds(settings.agent.bounds());

    for entry in &settings.collections {
        if !only.is_empty() && !only.contains(&entry.id) {
            continue;
        }
        let collection = searchkit_collections::from_settings(entry)
            .with_context(|| format!("Failed to open collection '{}'", entry.id))?;
        agent
            .attach_collection(collection)
            .with_context(|| format!("Failed to attach collection '{}'", entry.id))?;
        info!(collection = %entry.id, "Collection attached");
    }

    if agent.collections().is_empty() {
        anyhow::bail!("No collections configured");
    }
    Ok(agent)
}

/// Create the index for the fused schema and run one queue-then-index cycle.
pub fn run_index(agent: CollectionAgent, engine: Arc<dyn SearchEngine>) -> Result<IndexResult> {
    let mut indexer = Indexer::new(agent, engine);
    indexer
        .create_index(&Value::Null)
        .context("Failed to create index")?;
    let result = indexer.index().context("Indexing failed")?;
    info!(
        queued = result.queued,
        consumed = result.consumed,
        indexed = result.indexed,
        skipped = result.skipped,
        "Index run complete"
    );
    Ok(result)
}

/// Queue every collection of `agent`.
pub fn run_queue(agent: CollectionAgent) -> Result<QueueResult> {
    let collector = Collector::new(agent);
    let result = collector.queue().context("Queueing failed")?;
    info!(total = result.total, "Queue run complete");
    Ok(result)
}

/// Fused schema of `agent` as JSON.
pub fn render_schema(agent: &mut CollectionAgent, pretty: bool) -> Result<String> {
    let schema = agent.schema().context("Failed to fuse collection schemas")?;
    let rendered = if pretty {
        serde_json::to_string_pretty(&*schema)
    } else {
        serde_json::to_string(&*schema)
    };
    rendered.context("Failed to serialize schema")
}

fn open_engine(output: Option<&Path>) -> Result<JsonLinesEngine> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {:?}", path))?;
            Ok(JsonLinesEngine::new(Box::new(BufWriter::new(file))))
        }
        None => Ok(JsonLinesEngine::stdout()),
    }
}

/// Handle `searchkit index`. Documents go to `output` (or stdout), the summary to stderr.
pub fn handle_index(settings: &Settings, output: Option<&Path>, only: &[String]) -> Result<()> {
    let agent = build_agent(settings, only)?;
    let engine = Arc::new(open_engine(output)?);
    let result = run_index(agent, engine)?;

    eprintln!(
        "{}",
        json!({
            "queued": result.queued,
            "consumed": result.consumed,
            "indexed": result.indexed,
            "skipped": result.skipped,
        })
    );
    Ok(())
}

/// Handle `searchkit queue`.
pub fn handle_queue(settings: &Settings, only: &[String]) -> Result<()> {
    let agent = build_agent(settings, only)?;
    let result = run_queue(agent)?;

    for (collection_id, count) in &result.by_collection {
        println!("{:<24} {}", collection_id, count);
    }
    println!("{:<24} {}", "total", result.total);
    Ok(())
}

/// Handle `searchkit schema`.
pub fn handle_schema(settings: &Settings, pretty: bool) -> Result<()> {
    let mut agent = build_agent(settings, &[])?;
    println!("{}", render_schema(&mut agent, pretty)?);
    Ok(())
}
