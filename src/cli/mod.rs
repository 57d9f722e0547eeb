//! CLI module for hbnb
//!
//! Provides command-line interface for:
//! - serve: Open storage and serve the HTTP API
//! - stats: Open storage and print per-collection counts

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command, ConfigArgs};
pub use commands::{run, run_command, serve, stats};
pub use config::{AppConfig, DEFAULT_CONFIG_PATH};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_json;
