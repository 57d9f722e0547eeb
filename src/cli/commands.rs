//! CLI command implementations
//!
//! Start-up sequence shared by every command:
//! 1. Configuration load (file, then flag/env overrides)
//! 2. Logging
//! 3. Storage open (loads every persisted entity)
//!
//! `serve` then runs the HTTP server on a tokio runtime until Ctrl-C.

use std::sync::Arc;

use tracing::info;

use crate::http_server::HttpServer;
use crate::observability::init_tracing;
use crate::storage::StorageEngine;

use super::args::{Command, ConfigArgs};
use super::config::AppConfig;
use super::errors::{CliError, CliResult};
use super::io::write_json;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { overrides } => serve(&overrides),
        Command::Stats { overrides } => stats(&overrides),
    }
}

fn boot(args: &ConfigArgs) -> CliResult<(AppConfig, StorageEngine)> {
    let config = AppConfig::resolve(args)?;
    init_tracing(&config.log_settings()).map_err(CliError::boot_failed)?;

    info!(
        backend = %config.storage.backend,
        path = %config.storage.path.display(),
        "opening storage"
    );
    let backend = config.storage.open_backend()?;
    let engine = StorageEngine::open(backend)?;
    Ok((config, engine))
}

/// Start the HTTP API server
pub fn serve(args: &ConfigArgs) -> CliResult<()> {
    let (config, engine) = boot(args)?;
    let server = HttpServer::new(config.http, Arc::new(engine));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Print per-collection counts and exit
pub fn stats(args: &ConfigArgs) -> CliResult<()> {
    let (_config, engine) = boot(args)?;
    write_json(&engine.collection_counts())?;
    engine.close()?;
    Ok(())
}
