//! Binary entry point for discovery-index.
//!
//! Command-line access to a discovery index: replace, read and delete link
//! sets, run AND-searches page by page, and convert identifiers to and from
//! their base64url form.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use discovery_index::cli::{self, SearchArgs};
use discovery_index::config::DiscoveryConfig;
use discovery_index::observability::{self, InitOptions};
use discovery_index::services::{BackendFactory, DiscoveryService};
use discovery_index::{Error, ErrorKind};
use std::path::PathBuf;
use std::process::ExitCode;

/// discovery-index - find shells by their specific asset identifiers.
#[derive(Parser)]
#[command(name = "discovery-index")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// `SQLite` database path (overrides configuration).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Replace the link set of a shell.
    ///
    /// Needs at least one --link or --json. Passing an empty JSON array
    /// removes the shell, like `delete`.
    Put {
        /// Shell identifier.
        shell_id: String,

        /// The identifier is already base64url encoded.
        #[arg(long)]
        encoded: bool,

        /// Pair to link, as name=value (repeatable).
        #[arg(short, long = "link", value_name = "NAME=VALUE")]
        links: Vec<String>,

        /// JSON array of specific asset ids; `-` reads stdin. `[]` removes the shell.
        #[arg(long, value_name = "FILE", required_unless_present = "links")]
        json: Option<String>,
    },

    /// Show the link set of a shell.
    Get {
        /// Shell identifier.
        shell_id: String,

        /// The identifier is already base64url encoded.
        #[arg(long)]
        encoded: bool,
    },

    /// Remove the link set of a shell.
    Delete {
        /// Shell identifier.
        shell_id: String,

        /// The identifier is already base64url encoded.
        #[arg(long)]
        encoded: bool,
    },

    /// Find shells carrying every given link.
    Search {
        /// Constraint as name=value (repeatable).
        #[arg(short, long = "link", value_name = "NAME=VALUE")]
        links: Vec<String>,

        /// base64url-encoded JSON constraints, comma-separated (repeatable).
        #[arg(long = "asset-ids", value_name = "B64JSON")]
        asset_ids: Vec<String>,

        /// Search request body; `-` reads stdin.
        #[arg(long, value_name = "FILE")]
        json: Option<String>,

        /// Maximum number of results (0 for the default).
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,

        /// Cursor from a previous page.
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Encode an identifier as base64url.
    Encode {
        /// Plaintext identifier.
        text: String,
    },

    /// Decode a base64url identifier.
    Decode {
        /// Encoded identifier.
        token: String,
    },

    /// Manage configuration.
    Config {
        /// Show the effective configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let (config, skipped_files) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return exit_code(&e);
        },
    };

    let _observability = match observability::init(
        &config,
        InitOptions {
            verbose: cli.verbose,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    for message in &skipped_files {
        tracing::warn!("{message}");
    }

    match run_command(cli.command, &config) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            },
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            },
        },
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code(&e)
        },
    }
}

/// Runs the selected command.
fn run_command(
    command: Commands,
    config: &DiscoveryConfig,
) -> discovery_index::Result<serde_json::Value> {
    match command {
        Commands::Encode { text } => Ok(cli::encode(&text)),
        Commands::Decode { token } => cli::decode(&token),
        Commands::Config { show: _ } => cli::show_config(config),
        Commands::Put {
            shell_id,
            encoded,
            links,
            json,
        } => cli::put(&open(config)?, &shell_id, encoded, &links, json.as_deref()),
        Commands::Get { shell_id, encoded } => cli::get(&open(config)?, &shell_id, encoded),
        Commands::Delete { shell_id, encoded } => {
            cli::delete(&open(config)?, &shell_id, encoded)
        },
        Commands::Search {
            links,
            asset_ids,
            json,
            limit,
            cursor,
        } => cli::search(
            &open(config)?,
            &SearchArgs {
                links,
                asset_ids,
                json_source: json,
                limit,
                cursor,
            },
        ),
    }
}

fn open(config: &DiscoveryConfig) -> discovery_index::Result<DiscoveryService> {
    BackendFactory::create_service(config)
}

/// Loads configuration: file, then environment, then command-line flags.
///
/// Also returns the default-location files that were skipped, to be logged
/// once observability is up.
fn load_config(cli: &Cli) -> discovery_index::Result<(DiscoveryConfig, Vec<String>)> {
    let (mut config, skipped) = match &cli.config {
        Some(path) => (DiscoveryConfig::load_from_file(path)?, Vec::new()),
        None => DiscoveryConfig::load_default(),
    };
    config.apply_env_overrides()?;
    if let Some(db) = &cli.db {
        config.storage.path = Some(db.clone());
    }
    Ok((config, skipped))
}

/// Exit code per error kind: 2 validation, 3 not found, 1 storage.
fn exit_code(error: &Error) -> ExitCode {
    match error.kind() {
        ErrorKind::Validation => ExitCode::from(2),
        ErrorKind::NotFound => ExitCode::from(3),
        ErrorKind::Storage => ExitCode::FAILURE,
    }
}
