//! searchkit
//!
//! Queues configured collections and indexes them.
//!
//! # Usage
//!
//! ```bash
//! searchkit index [--output FILE] [--collection ID]...
//! searchkit queue [--collection ID]...
//! searchkit schema [--pretty]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/searchkit/config.toml)
//! 3. Environment variables (SEARCHKIT_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use searchkit_daemon::{
    handle_index, handle_queue, handle_schema, init_logging, load_settings, Cli, Commands,
    Overrides,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        log_level: cli.log_level.clone(),
        limit: cli.limit,
        timeout_secs: cli.timeout,
    };
    let settings = load_settings(cli.config.as_deref(), &overrides)?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Index {
            output,
            collections,
        } => {
            handle_index(&settings, output.as_deref(), &collections)?;
        }
        Commands::Queue { collections } => {
            handle_queue(&settings, &collections)?;
        }
        Commands::Schema { pretty } => {
            handle_schema(&settings, pretty)?;
        }
    }

    Ok(())
}
