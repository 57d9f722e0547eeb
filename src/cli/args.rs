//! CLI argument definitions using clap
//!
//! Commands:
//! - hbnb serve [--config <path>] [--host] [--port] [--storage] [--path]
//! - hbnb stats [--config <path>] [--storage] [--path]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::storage::BackendKind;

/// hbnb - JSON API over states, cities, places, reviews and users
#[derive(Parser, Debug)]
#[command(name = "hbnb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server
    Serve {
        #[command(flatten)]
        overrides: ConfigArgs,
    },

    /// Print the number of stored entities per collection and exit
    Stats {
        #[command(flatten)]
        overrides: ConfigArgs,
    },
}

/// Config file location plus per-field overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to configuration file (default: ./hbnb.json, if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, env = "HBNB_API_HOST")]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(long, env = "HBNB_API_PORT")]
    pub port: Option<u16>,

    /// Storage backend: json_file, record_log or memory
    #[arg(long, env = "HBNB_TYPE_STORAGE")]
    pub storage: Option<BackendKind>,

    /// Store file for durable backends
    #[arg(long, env = "HBNB_STORAGE_PATH")]
    pub path: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "hbnb", "serve", "--port", "5001", "--storage", "record_log", "--path", "hbnb.log",
        ])
        .unwrap();
        match cli.command {
            Command::Serve { overrides } => {
                assert_eq!(overrides.port, Some(5001));
                assert_eq!(overrides.storage, Some(BackendKind::RecordLog));
                assert_eq!(overrides.path, Some(PathBuf::from("hbnb.log")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["hbnb", "stats", "--storage", "db"]).is_err());
    }
}
