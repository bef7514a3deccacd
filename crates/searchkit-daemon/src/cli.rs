//! CLI argument parsing for the searchkit runner.
//!
//! CLI flags override all other configuration sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// searchkit
///
/// Queues configured collections and indexes them into a search engine.
#[derive(Parser, Debug)]
#[command(name = "searchkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/searchkit/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Max items per run
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Max seconds per run
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Runner commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queue every configured collection, then index the queue
    Index {
        /// Write indexed documents here as JSON lines (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only index the named collections
        #[arg(long = "collection")]
        collections: Vec<String>,
    },

    /// Queue every configured collection and report the counts (dry run:
    /// the in-memory queue is discarded on exit)
    Queue {
        /// Only queue the named collections
        #[arg(long = "collection")]
        collections: Vec<String>,
    },

    /// Print the fused schema of the configured collections
    Schema {
        /// Pretty-print the JSON
        #[arg(short, long)]
        pretty: bool,
    },
}
