// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Assignments Projection CLI
//!
//! The `assignments` binary hosts the assignments projection: it replays
//! event streams into the per-profile membership graph and runs the temporal
//! reconciler that activates and expires temporary assignments.
//!
//! ## Commands
//!
//! - `assignments run [--events FILE]` - Run the projection until Ctrl+C/SIGTERM
//! - `assignments tick --events FILE [--temporary FILE] [--at TIME]` - One reconciliation pass
//! - `assignments config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use assignments_core::domain::config::ProjectionConfig;
use assignments_projection::commands::{self, ConfigCommand, RunArgs, TickArgs};

/// Assignments projection - time-aware membership graphs
#[derive(Parser)]
#[command(name = "assignments")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "ASSIGNMENTS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to spec.logging.level
    #[arg(long, global = true, env = "ASSIGNMENTS_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the projection with its background tasks
    #[command(name = "run")]
    Run(RunArgs),

    /// Replay events and run a single temporal tick
    #[command(name = "tick")]
    Tick(TickArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match &cli.log_level {
        Some(level) => level.clone(),
        None => ProjectionConfig::load_or_default(cli.config.clone())
            .map(|config| config.spec.logging.level)
            .unwrap_or_else(|_| "info".to_string()),
    };
    init_logging(&level)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.config).await,
        Commands::Tick(args) => commands::tick::execute(args, cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
