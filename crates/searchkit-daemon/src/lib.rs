//! searchkit runner library exports.
//!
//! This crate provides the `searchkit` binary.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (index, queue, schema)
//! - `engine`: JSON-lines search engine the runner indexes into

pub mod cli;
pub mod commands;
pub mod engine;

pub use cli::{Cli, Commands};
pub use commands::{
    build_agent, handle_index, handle_queue, handle_schema, init_logging, load_settings,
    render_schema, run_index, run_queue, Overrides,
};
pub use engine::JsonLinesEngine;
