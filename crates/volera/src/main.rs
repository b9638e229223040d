// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Volera - A multi-agent shopping research assistant.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod show_config;
mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use volera_config::VoleraConfig;

/// Volera - A multi-agent shopping research assistant.
#[derive(Parser, Debug)]
#[command(name = "volera", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the WebSocket gateway, research graph, and sync loop.
    Serve,
    /// Run one session sync pass against the durable store and exit.
    Sync,
    /// Print the effective configuration with secrets redacted.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> VoleraConfig {
    let loaded = match path {
        Some(path) => volera_config::load_and_validate_path(path),
        None => volera_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            volera_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Sync) => sync::run_sync(config).await,
        Some(Commands::Config) => show_config::print_config(&config),
        None => {
            println!("volera: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
