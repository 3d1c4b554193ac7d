pub mod clipboard;
pub mod commands;
pub mod config;
pub mod db;
pub mod decoder;
pub mod error;
pub mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use commands::{AppState, Command};
use config::AppConfig;
use db::HistoryStore;
use decoder::MultiFormatProvider;
use services::decode_engine::DecodeEngine;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the history database and its backups
    #[arg(long, env = "QRDECODER_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match AppConfig::resolve(cli.data_dir) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let store = match HistoryStore::open(&config.db_path()) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!("failed to open history store: {err}");
            eprintln!("cannot open history database {}: {err}", config.db_path().display());
            return ExitCode::FAILURE;
        }
    };

    let state = AppState {
        engine: DecodeEngine::new(
            store.clone(),
            Arc::new(MultiFormatProvider::new()),
            clipboard::default_service(),
        ),
    };

    let result = commands::dispatch(&state, cli.command);
    drop(state);

    if let Ok(store) = Arc::try_unwrap(store) {
        if let Err(err) = store.close() {
            warn!("failed to close history store: {err}");
        }
    }

    match result {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
