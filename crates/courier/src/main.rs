// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - command-line client for a real-time messaging gateway.
//!
//! This is the binary entry point.

mod commands;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;

/// Courier - real-time messaging client.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect and print every event until interrupted.
    Listen,
    /// Send one message and wait for its first acknowledgement.
    Send {
        /// Recipient user or group id.
        #[arg(long)]
        to: String,
        /// Address a group instead of a user.
        #[arg(long)]
        group: bool,
        /// Message text.
        content: String,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(config.client.effective_log_level());

    let result = match cli.command {
        Commands::Listen => commands::listen(&config).await,
        Commands::Send { to, group, content } => {
            commands::send(&config, &to, group, &content).await
        }
        Commands::Config => commands::print_config(&config),
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("courier: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
